// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by every layer.
//!
//! All fallible operations surface a [`Status`] at the RPC boundary. Inner
//! layers carry their own `thiserror` enums and convert on the way out.

use crate::id::BuildId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// RPC status code. Mirrors the code set clients dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthenticated,
    PermissionDenied,
    InvalidArgument,
    FailedPrecondition,
    NotFound,
    Internal,
    Unimplemented,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::PermissionDenied => "permission_denied",
            Self::InvalidArgument => "invalid_argument",
            Self::FailedPrecondition => "failed_precondition",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
            Self::Unimplemented => "unimplemented",
        }
    }
}

/// Structured payload for the "image missing, rebuild triggered" flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedsBuild {
    pub build_id: Option<BuildId>,
    pub build_number: Option<u64>,
    /// Whether an asynchronous rebuild was kicked off.
    pub rebuild_triggered: bool,
}

/// A status error as surfaced to clients.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{}: {message}", code.as_str())]
pub struct Status {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_build: Option<NeedsBuild>,
}

impl Status {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), needs_build: None }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthenticated, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FailedPrecondition, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unimplemented, message)
    }

    /// Attach the structured needs-build payload.
    pub fn with_needs_build(mut self, needs_build: NeedsBuild) -> Self {
        self.needs_build = Some(needs_build);
        self
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
