// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log level classification for container output.
//!
//! Hand-rolled scanning with word-boundary matching; substring matching
//! misclassifies lines like "installation complete".

use serde::{Deserialize, Serialize};

use crate::logline::StreamKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level tokens recognized in structured positions (rules 1-4).
const LEVEL_TOKENS: &[(&str, LogLevel)] = &[
    ("ERROR", LogLevel::Error),
    ("FATAL", LogLevel::Error),
    ("WARNING", LogLevel::Warn),
    ("WARN", LogLevel::Warn),
    ("INFO", LogLevel::Info),
    ("DEBUG", LogLevel::Debug),
    ("TRACE", LogLevel::Debug),
];

/// Loose keywords matched on word boundaries (rule 5). Never maps to INFO;
/// plain prose stays at the stream default.
const LOOSE_KEYWORDS: &[(&str, LogLevel)] = &[
    ("error", LogLevel::Error),
    ("fatal", LogLevel::Error),
    ("failed", LogLevel::Error),
    ("warning", LogLevel::Warn),
    ("warn", LogLevel::Warn),
    ("debug", LogLevel::Debug),
    ("trace", LogLevel::Debug),
];

/// Server-activity keywords that pin a line to INFO (rule 6).
const SERVER_ACTIVITY: &[&str] = &[
    "[server]", "joined", "left the game", "starting", "started", "stopping", "listening",
    "preparing", "loading", "done (",
];

/// Build-system keywords that pin a line to INFO (rule 7).
const BUILD_ACTIVITY: &[&str] = &["nixpacks", "railpack", "[internal]", "sha256:"];

/// Classify a log line, in the documented priority order.
pub fn classify(line: &str, stream: StreamKind) -> LogLevel {
    let lower = line.to_ascii_lowercase();

    // 1. Minecraft/Java-style "[Server thread/INFO]:" tokens.
    for (token, level) in LEVEL_TOKENS {
        let needle = format!("/{}]:", token.to_ascii_lowercase());
        if lower.contains(&needle) {
            return *level;
        }
    }

    // 2. Standalone level word at line start.
    let start = lower.trim_start();
    for (token, level) in LEVEL_TOKENS {
        let t = token.to_ascii_lowercase();
        if start.starts_with(&t) && !followed_by_word_char(start, t.len()) && !start[t.len()..].starts_with(':') {
            return *level;
        }
    }

    // 3. Bracketed level tokens.
    for (token, level) in LEVEL_TOKENS {
        let needle = format!("[{}]", token.to_ascii_lowercase());
        if lower.contains(&needle) {
            return *level;
        }
    }

    // 4. "level:" prefix.
    for (token, level) in LEVEL_TOKENS {
        let needle = format!("{}:", token.to_ascii_lowercase());
        if start.starts_with(&needle) {
            return *level;
        }
    }

    // 5. Loose keywords on word boundaries.
    for (word, level) in LOOSE_KEYWORDS {
        if contains_word(&lower, word) {
            return *level;
        }
    }

    // 6./7. Activity keywords pin to INFO.
    if SERVER_ACTIVITY.iter().any(|k| lower.contains(k))
        || BUILD_ACTIVITY.iter().any(|k| lower.contains(k))
    {
        return LogLevel::Info;
    }

    // 8. Stream default. Stderr without a rule-5 hit is still INFO; build
    // tools routinely chat on stderr.
    match stream {
        StreamKind::Stdout | StreamKind::Stderr => LogLevel::Info,
    }
}

fn is_word_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn followed_by_word_char(s: &str, idx: usize) -> bool {
    s.as_bytes().get(idx).copied().is_some_and(is_word_char)
}

/// Word-boundary containment over ASCII-lowered text.
fn contains_word(haystack: &str, needle: &str) -> bool {
    let hay = haystack.as_bytes();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let begin = from + pos;
        let end = begin + needle.len();
        let left_ok = begin == 0 || !is_word_char(hay[begin - 1]);
        let right_ok = end >= hay.len() || !is_word_char(hay[end]);
        if left_ok && right_ok {
            return true;
        }
        from = begin + 1;
    }
    false
}

#[cfg(test)]
#[path = "loglevel_tests.rs"]
mod tests;
