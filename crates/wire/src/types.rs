// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared view types returned by both services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sv_core::{
    BuildRecord, BuildStatus, ContainerLocation, LifecycleStatus, LocationStatus, ResourceEnvelope,
    Workload, WorkloadHealth, WorkloadKind,
};

/// Client-facing projection of a workload record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadView {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub kind: WorkloadKind,
    pub status: LifecycleStatus,
    pub status_code: i32,
    pub health: WorkloadHealth,
    pub envelope: ResourceEnvelope,
    pub image: Option<String>,
    pub domain: String,
    pub groups: Vec<String>,
    pub custom_domains: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_deployed_at: Option<DateTime<Utc>>,
}

impl WorkloadView {
    pub fn from_record(w: &Workload, base_domain: &str) -> Self {
        Self {
            id: w.id.to_string(),
            organization_id: w.org_id.to_string(),
            name: w.name.clone(),
            kind: w.kind,
            status: w.status,
            status_code: w.status.code(),
            health: w.health,
            envelope: w.envelope.clone(),
            image: w.image.clone(),
            domain: w.default_domain(base_domain),
            groups: w.groups.clone(),
            custom_domains: w.custom_domains.iter().map(|d| d.encode()).collect(),
            created_at: w.created_at,
            updated_at: w.updated_at,
            last_deployed_at: w.last_deployed_at,
        }
    }
}

/// Client-facing projection of a build record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildView {
    pub id: String,
    pub workload_id: String,
    pub number: u64,
    pub status: BuildStatus,
    pub image: Option<String>,
    pub size_bytes: Option<u64>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    pub triggered_by: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&BuildRecord> for BuildView {
    fn from(b: &BuildRecord) -> Self {
        Self {
            id: b.id.to_string(),
            workload_id: b.workload_id.to_string(),
            number: b.number,
            status: b.status,
            image: b.image.clone(),
            size_bytes: b.size_bytes,
            duration_ms: b.duration_ms,
            error: b.error.clone(),
            triggered_by: b.triggered_by.clone(),
            started_at: b.started_at,
            completed_at: b.completed_at,
        }
    }
}

/// Client-facing projection of a container location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerView {
    pub container_id: String,
    pub node_id: String,
    pub node_host: String,
    pub status: LocationStatus,
    pub host_port: Option<u16>,
    pub service_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ContainerLocation> for ContainerView {
    fn from(loc: &ContainerLocation) -> Self {
        Self {
            container_id: loc.container_id.to_string(),
            node_id: loc.node_id.to_string(),
            node_host: loc.node_host.clone(),
            status: loc.status,
            host_port: loc.host_port,
            service_name: loc.service_name.clone(),
            updated_at: loc.updated_at,
        }
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
