// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compose validation diagnostics.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// One validation finding with its source range (1-based, inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeDiagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateComposeResponse {
    pub valid: bool,
    pub diagnostics: Vec<ComposeDiagnostic>,
    /// Legacy single-error field older clients still read.
    #[serde(default)]
    pub error: Option<String>,
}

impl ValidateComposeResponse {
    pub fn ok() -> Self {
        Self { valid: true, diagnostics: Vec::new(), error: None }
    }

    pub fn from_diagnostics(diagnostics: Vec<ComposeDiagnostic>) -> Self {
        let valid = !diagnostics.iter().any(|d| d.severity == DiagnosticSeverity::Error);
        let error = diagnostics
            .iter()
            .find(|d| d.severity == DiagnosticSeverity::Error)
            .map(|d| d.message.clone());
        Self { valid, diagnostics, error }
    }

    pub fn has_errors(&self) -> bool {
        !self.valid
    }
}

#[cfg(test)]
#[path = "compose_tests.rs"]
mod tests;
