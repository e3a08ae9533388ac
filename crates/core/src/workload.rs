// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workload records: deployments and game servers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::build::BuildConfigSnapshot;
use crate::domain::CustomDomain;
use crate::env::EnvMap;
use crate::id::{OrgId, UserId, WorkloadId};
use crate::status::{LifecycleStatus, WorkloadHealth};

/// The two workload kinds the control plane manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    Deployment,
    GameServer,
}

impl WorkloadKind {
    /// Id prefix used for generated workload ids.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Deployment => "deploy",
            Self::GameServer => "gs",
        }
    }
}

/// Generate a workload id from the creation unix second.
pub fn fresh_workload_id(kind: WorkloadKind, unix: i64) -> WorkloadId {
    WorkloadId::new(format!("{}-{}", kind.id_prefix(), unix))
}

/// Desired resource envelope for a workload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEnvelope {
    /// Relative CPU weight; unset means engine default.
    pub cpu_shares: Option<u32>,
    pub memory_bytes: Option<u64>,
    pub replicas: u32,
    pub port: Option<u16>,
}

impl ResourceEnvelope {
    /// True when `other` raises any resource dimension, which requires a
    /// fresh quota check.
    pub fn raised_by(&self, other: &ResourceEnvelope) -> bool {
        other.replicas > self.replicas
            || other.memory_bytes.unwrap_or(0) > self.memory_bytes.unwrap_or(0)
            || other.cpu_shares.unwrap_or(0) > self.cpu_shares.unwrap_or(0)
    }
}

/// Health-check descriptor carried on the workload record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    /// Probe command or HTTP path, engine-interpreted.
    pub probe: String,
    pub interval_secs: u32,
    pub timeout_secs: u32,
    pub retries: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkloadValidationError {
    #[error("workload name is empty")]
    EmptyName,
    #[error("image and compose manifest are mutually exclusive")]
    ImageAndCompose,
    #[error("replicas must be >= 0")]
    NegativeReplicas,
    #[error("port {0} outside [1, 65535]")]
    PortOutOfRange(u32),
    #[error("cpu_shares must be >= 1 when set")]
    ZeroCpuShares,
    #[error("duplicate custom domain: {0}")]
    DuplicateDomain(String),
}

/// A deployment or game server record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub id: WorkloadId,
    pub org_id: OrgId,
    pub name: String,
    pub created_by: UserId,
    pub kind: WorkloadKind,
    pub envelope: ResourceEnvelope,
    /// Image reference; mutually exclusive with `compose_yaml`.
    pub image: Option<String>,
    /// Compose manifest text; mutually exclusive with `image`.
    pub compose_yaml: Option<String>,
    /// Build-relevant configuration, frozen into build records at trigger.
    pub build_config: BuildConfigSnapshot,
    pub env: EnvMap,
    /// Ordered tag set.
    pub groups: Vec<String>,
    /// Deployments only; case-insensitive unique.
    pub custom_domains: Vec<CustomDomain>,
    pub health_check: Option<HealthCheckSpec>,
    pub status: LifecycleStatus,
    pub health: WorkloadHealth,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_deployed_at: Option<DateTime<Utc>>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Workload {
    /// New workload in `Created` with empty collections, per the creation
    /// contract.
    pub fn new(
        id: WorkloadId,
        org_id: OrgId,
        name: impl Into<String>,
        created_by: UserId,
        kind: WorkloadKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            org_id,
            name: name.into(),
            created_by,
            kind,
            envelope: ResourceEnvelope { replicas: 1, ..ResourceEnvelope::default() },
            image: None,
            compose_yaml: None,
            build_config: BuildConfigSnapshot::default(),
            env: EnvMap::new(),
            groups: Vec::new(),
            custom_domains: Vec::new(),
            health_check: None,
            status: LifecycleStatus::Created,
            health: WorkloadHealth::None,
            created_at: now,
            updated_at: now,
            last_deployed_at: None,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_compose(&self) -> bool {
        self.compose_yaml.as_deref().is_some_and(|y| !y.trim().is_empty())
    }

    /// Default domain assigned at creation: `<id>.<base_domain>`.
    pub fn default_domain(&self, base_domain: &str) -> String {
        format!("{}.{}", self.id, base_domain)
    }

    /// Enforce the record invariants.
    pub fn validate(&self) -> Result<(), WorkloadValidationError> {
        if self.name.trim().is_empty() {
            return Err(WorkloadValidationError::EmptyName);
        }
        if self.image.as_deref().is_some_and(|i| !i.is_empty()) && self.is_compose() {
            return Err(WorkloadValidationError::ImageAndCompose);
        }
        if let Some(port) = self.envelope.port {
            if port == 0 {
                return Err(WorkloadValidationError::PortOutOfRange(u32::from(port)));
            }
        }
        if self.envelope.cpu_shares == Some(0) {
            return Err(WorkloadValidationError::ZeroCpuShares);
        }
        let mut seen: Vec<String> = Vec::new();
        for d in &self.custom_domains {
            let key = d.domain().to_ascii_lowercase();
            if seen.contains(&key) {
                return Err(WorkloadValidationError::DuplicateDomain(d.domain().to_string()));
            }
            seen.push(key);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "workload_tests.rs"]
mod tests;
