// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    minecraft_info = { "[12:34:56] [Server thread/INFO]: Done (3.2s)!", LogLevel::Info },
    minecraft_warn = { "[12:34:56] [Server thread/WARN]: Can't keep up!", LogLevel::Warn },
    minecraft_error = { "[main/ERROR]: Exception in server tick loop", LogLevel::Error },
    standalone_start = { "ERROR something broke", LogLevel::Error },
    standalone_warn = { "WARN low memory", LogLevel::Warn },
    bracketed = { "2024 [ERROR] oh no", LogLevel::Error },
    bracketed_debug = { "[debug] verbose detail", LogLevel::Debug },
    prefix = { "error: connection refused", LogLevel::Error },
    prefix_warn = { "warning: deprecated flag", LogLevel::Warn },
    loose_failed = { "task failed successfully", LogLevel::Error },
    loose_fatal = { "a fatal signal arrived", LogLevel::Error },
    loose_warn = { "this is your last warning", LogLevel::Warn },
    loose_trace = { "emitting trace output", LogLevel::Debug },
)]
fn classify_stdout(line: &str, expected: LogLevel) {
    assert_eq!(classify(line, StreamKind::Stdout), expected);
}

#[test]
fn word_boundary_excludes_information() {
    // "information" and "inferior" must not classify as errors or infos-by-error.
    assert_eq!(classify("useful information here", StreamKind::Stdout), LogLevel::Info);
    assert_eq!(classify("an inferior approach", StreamKind::Stdout), LogLevel::Info);
    // "installation" must not match "install"-adjacent rules either.
    assert_eq!(classify("installation complete", StreamKind::Stdout), LogLevel::Info);
}

#[test]
fn server_activity_is_info() {
    assert_eq!(classify("Steve joined the game", StreamKind::Stdout), LogLevel::Info);
    assert_eq!(classify("[Server] restart scheduled", StreamKind::Stdout), LogLevel::Info);
    assert_eq!(classify("Starting minecraft server", StreamKind::Stderr), LogLevel::Info);
}

#[test]
fn build_activity_is_info() {
    assert_eq!(classify("nixpacks build plan", StreamKind::Stderr), LogLevel::Info);
    assert_eq!(classify("#8 [internal] load build context", StreamKind::Stderr), LogLevel::Info);
    assert_eq!(classify("digest: sha256:abc123", StreamKind::Stderr), LogLevel::Info);
}

#[test]
fn stderr_defaults_to_info_without_keywords() {
    assert_eq!(classify("plain chatter", StreamKind::Stderr), LogLevel::Info);
}

#[test]
fn stderr_error_keyword_still_wins() {
    assert_eq!(classify("request failed", StreamKind::Stderr), LogLevel::Error);
}

#[test]
fn minecraft_token_beats_loose_keywords() {
    // Rule 1 outranks the loose "failed" hit.
    let line = "[Server thread/INFO]: login failed for guest";
    assert_eq!(classify(line, StreamKind::Stdout), LogLevel::Info);
}
