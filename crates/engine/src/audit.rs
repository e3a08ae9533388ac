// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit trail emission.
//!
//! Auditable handlers emit entries asynchronously; a failed audit write
//! is logged and never surfaces to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One auditable operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: Option<String>,
    pub organization_id: Option<String>,
    pub action: String,
    pub service: String,
    pub resource_type: String,
    pub resource_id: String,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    /// Serialized request payload.
    pub request: Option<String>,
    pub response_status: String,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub at: DateTime<Utc>,
}

/// Consumer contract for audit entries.
pub trait AuditSink: Send + Sync {
    /// Fire-and-forget; implementations must not block the caller.
    fn emit(&self, entry: AuditEntry);
}

/// Default sink: structured log lines.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, entry: AuditEntry) {
        tracing::info!(
            target: "audit",
            user = entry.user_id.as_deref().unwrap_or("-"),
            org = entry.organization_id.as_deref().unwrap_or("-"),
            action = %entry.action,
            service = %entry.service,
            resource = %format!("{}/{}", entry.resource_type, entry.resource_id),
            status = %entry.response_status,
            duration_ms = entry.duration_ms,
            "audit"
        );
    }
}

/// Collecting sink for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    entries: std::sync::Arc<parking_lot::Mutex<Vec<AuditEntry>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl MemoryAuditSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl AuditSink for MemoryAuditSink {
    fn emit(&self, entry: AuditEntry) {
        self.entries.lock().push(entry);
    }
}
