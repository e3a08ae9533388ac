// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frames delivered on streaming methods (one JSON object per line).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sv_core::{LifecycleStatus, LogLevel, MetricSample, StreamKind};

/// One log line, sanitized and classified.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFrame {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub stream: StreamKind,
    pub message: String,
    /// Originating container or `engine` for synthetic event lines.
    #[serde(default)]
    pub source: Option<String>,
}

/// One metric sample (or per-instant aggregate).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricFrame {
    #[serde(flatten)]
    pub sample: MetricSample,
}

/// Lifecycle status frame for `StreamGameServerStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFrame {
    pub at: DateTime<Utc>,
    pub status: LifecycleStatus,
    pub status_code: i32,
    pub health: String,
}
