// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status enums shared across the control plane.

use serde::{Deserialize, Serialize};

/// Workload lifecycle status. The numeric order defines the status code
/// carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Unspecified,
    Created,
    Building,
    Deploying,
    Running,
    Stopped,
    Failed,
}

impl LifecycleStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Unspecified => 0,
            Self::Created => 1,
            Self::Building => 2,
            Self::Deploying => 3,
            Self::Running => 4,
            Self::Stopped => 5,
            Self::Failed => 6,
        }
    }

    /// Statuses the reconciler considers "should have containers".
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Deploying)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Created => "created",
            Self::Building => "building",
            Self::Deploying => "deploying",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build record status. Reaches a terminal state exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Queued,
    Preparing,
    Building,
    Success,
    Failed,
    Cancelled,
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Preparing => "preparing",
            Self::Building => "building",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed status of a located container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationStatus {
    Created,
    Running,
    Stopped,
    Removed,
    Unknown,
}

impl LocationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Removed => "removed",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-container health as reported by the engine's health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerHealth {
    /// No health probe configured.
    None,
    Starting,
    Healthy,
    Unhealthy,
}

/// Workload-level health derived from container health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadHealth {
    /// No container carries a health probe; serialized as the empty string.
    #[default]
    #[serde(rename = "")]
    None,
    Starting,
    Healthy,
    Unhealthy,
}

impl WorkloadHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Starting => "starting",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// Derive workload health from container-level health.
///
/// Any unhealthy wins, then any starting, then all-healthy; a workload
/// whose containers carry no probe has no health at all.
pub fn derive_workload_health(containers: &[ContainerHealth]) -> WorkloadHealth {
    if containers.iter().any(|h| *h == ContainerHealth::Unhealthy) {
        return WorkloadHealth::Unhealthy;
    }
    if containers.iter().any(|h| *h == ContainerHealth::Starting) {
        return WorkloadHealth::Starting;
    }
    // Remaining states are Healthy and None; healthy when at least one
    // probe exists, empty when none do.
    if containers.iter().any(|h| *h == ContainerHealth::Healthy) {
        return WorkloadHealth::Healthy;
    }
    WorkloadHealth::None
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
