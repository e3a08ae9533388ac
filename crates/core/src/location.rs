// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container location rows: where a workload's containers actually live.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ContainerId, NodeId, WorkloadId};
use crate::status::LocationStatus;

/// A `(node, container)` record materializing a workload on a worker node.
///
/// `(workload_id, container_id)` is unique; every location belongs to
/// exactly one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerLocation {
    pub workload_id: WorkloadId,
    pub node_id: NodeId,
    pub node_host: String,
    pub container_id: ContainerId,
    pub host_port: Option<u16>,
    pub status: LocationStatus,
    /// Compose child service name, when the workload is compose-defined.
    pub service_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContainerLocation {
    pub fn new(
        workload_id: WorkloadId,
        node_id: NodeId,
        node_host: impl Into<String>,
        container_id: ContainerId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            workload_id,
            node_id,
            node_host: node_host.into(),
            container_id,
            host_port: None,
            status: LocationStatus::Created,
            service_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == LocationStatus::Running
    }
}
