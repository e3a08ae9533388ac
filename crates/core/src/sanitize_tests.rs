// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn invalid_utf8_replaced() {
    let out = sanitize_utf8(&[0x68, 0x69, 0xff, 0x21]);
    assert_eq!(out, "hi\u{fffd}!");
}

#[parameterized(
    sgr = { "\x1b[31mred\x1b[0m", "red" },
    cursor = { "\x1b[2Khello", "hello" },
    mode = { "\x1b[?25lhidden", "hidden" },
    osc_bel = { "\x1b]0;title\x07body", "body" },
    osc_st = { "\x1b]0;title\x1b\\body", "body" },
    two_byte = { "\x1bcreset", "reset" },
    malformed_sgr = { "[0mplain", "plain" },
    malformed_color = { "[38;5;12mblue", "blue" },
)]
fn ansi_stripped(input: &str, expected: &str) {
    assert_eq!(strip_ansi(input), expected);
}

#[test]
fn nested_sequences_need_iteration() {
    // Stripping the outer CSI reveals the inner malformed one.
    let input = "\x1b[31m[0mtext";
    assert_eq!(strip_ansi(input), "text");
}

#[test]
fn info_brackets_survive() {
    assert_eq!(strip_ansi("[INFO] message"), "[INFO] message");
    assert_eq!(strip_ansi("[init] message"), "[init] message");
}

#[parameterized(
    clock = { "[12:34:56] Server started", "Server started" },
    iso_z = { "2024-07-01T10:20:30Z listening", "listening" },
    iso_frac = { "2024-07-01T10:20:30.123456789Z listening", "listening" },
    iso_offset = { "2024-07-01T10:20:30+02:00 listening", "listening" },
    iso_space = { "2024-07-01 10:20:30 listening", "listening" },
    init_marker = { "[init] container booting", "container booting" },
    stacked = { "[12:34:56] [init] go", "go" },
    untouched = { "no timestamps here", "no timestamps here" },
)]
fn timestamps_stripped(input: &str, expected: &str) {
    assert_eq!(strip_timestamps(input), expected);
}

#[test]
fn clock_like_but_not_clock_survives() {
    assert_eq!(strip_timestamps("[ab:cd:ef] text"), "[ab:cd:ef] text");
    assert_eq!(strip_timestamps("[1:23:45] text"), "[1:23:45] text");
}

#[test]
fn full_pipeline() {
    let line = b"\x1b[32m[12:00:00] done\x1b[0m";
    assert_eq!(sanitize_line(line), "done");
}

#[test]
fn output_is_always_valid_utf8_without_escapes() {
    let noisy: Vec<u8> = [b"\x1b[31m".as_slice(), &[0xfe, 0xff], b"x[0m"].concat();
    let out = sanitize_line(&noisy);
    assert!(out.chars().all(|c| c != '\u{1b}'));
    assert!(std::str::from_utf8(out.as_bytes()).is_ok());
}
