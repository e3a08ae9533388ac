// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build records and the configuration snapshot a build is taken from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::{BuildId, OrgId, WorkloadId};
use crate::status::BuildStatus;

/// Snapshot of the workload's build-relevant configuration, frozen at
/// build trigger so reverts can restore it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfigSnapshot {
    pub repo_url: Option<String>,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub build_command: Option<String>,
    pub install_command: Option<String>,
    pub start_command: Option<String>,
    pub dockerfile_path: Option<String>,
    pub compose_file_path: Option<String>,
    pub strategy: Option<String>,
}

impl BuildConfigSnapshot {
    /// Whether anything buildable was configured at snapshot time.
    pub fn has_source(&self) -> bool {
        self.repo_url.as_deref().is_some_and(|r| !r.is_empty())
            || self.dockerfile_path.as_deref().is_some_and(|p| !p.is_empty())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildStateError {
    #[error("build {0} already reached terminal state {1}")]
    AlreadyTerminal(BuildId, BuildStatus),
}

/// One build of a workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: BuildId,
    pub workload_id: WorkloadId,
    pub org_id: OrgId,
    /// Monotonic per-workload build number.
    pub number: u64,
    pub status: BuildStatus,
    pub config: BuildConfigSnapshot,
    /// Image produced on success.
    pub image: Option<String>,
    /// Compose manifest produced on success (compose strategy).
    pub compose_yaml: Option<String>,
    pub size_bytes: Option<u64>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    /// Who or what triggered the build.
    pub triggered_by: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BuildRecord {
    pub fn new(
        id: BuildId,
        workload_id: WorkloadId,
        org_id: OrgId,
        number: u64,
        config: BuildConfigSnapshot,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            workload_id,
            org_id,
            number,
            status: BuildStatus::Queued,
            config,
            image: None,
            compose_yaml: None,
            size_bytes: None,
            duration_ms: None,
            error: None,
            triggered_by: None,
            started_at: now,
            completed_at: None,
        }
    }

    /// Advance to a non-terminal phase. Terminal records stay put.
    pub fn advance(&mut self, status: BuildStatus) -> Result<(), BuildStateError> {
        if self.status.is_terminal() {
            return Err(BuildStateError::AlreadyTerminal(self.id.clone(), self.status));
        }
        self.status = status;
        Ok(())
    }

    /// Reach a terminal state exactly once.
    pub fn complete(
        &mut self,
        status: BuildStatus,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), BuildStateError> {
        if self.status.is_terminal() {
            return Err(BuildStateError::AlreadyTerminal(self.id.clone(), self.status));
        }
        self.status = status;
        self.error = error;
        self.completed_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
        Ok(())
    }
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
