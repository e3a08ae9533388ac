// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository traits. Drivers live outside this crate; the control plane
//! is written against these seams only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sv_core::{
    BuildId, BuildRecord, ContainerId, ContainerLocation, LifecycleStatus, LocationStatus,
    LogLine, MetricSample, NodeId, OrgId, RoutingRule, Workload, WorkloadHealth, WorkloadId,
};

use crate::error::StorageError;

#[async_trait]
pub trait WorkloadRepository: Send + Sync {
    /// All workloads of an organization, or the fleet-wide set.
    async fn get_all(
        &self,
        org: Option<&OrgId>,
        include_deleted: bool,
    ) -> Result<Vec<Workload>, StorageError>;

    async fn get_by_id(&self, id: &WorkloadId) -> Result<Option<Workload>, StorageError>;

    /// Non-deleted workloads currently in any of `statuses`; the
    /// reconciler's sweep query.
    async fn list_by_status(
        &self,
        statuses: &[LifecycleStatus],
    ) -> Result<Vec<Workload>, StorageError>;

    async fn create(&self, workload: &Workload) -> Result<(), StorageError>;

    async fn update(&self, workload: &Workload) -> Result<(), StorageError>;

    /// Soft delete.
    async fn delete(&self, id: &WorkloadId, now: DateTime<Utc>) -> Result<(), StorageError>;

    async fn update_status(
        &self,
        id: &WorkloadId,
        status: LifecycleStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    async fn update_health(
        &self,
        id: &WorkloadId,
        health: WorkloadHealth,
    ) -> Result<(), StorageError>;

    async fn count(&self, org: &OrgId) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait BuildHistoryRepository: Send + Sync {
    async fn list_builds(&self, workload: &WorkloadId) -> Result<Vec<BuildRecord>, StorageError>;

    async fn get_build(&self, id: &BuildId) -> Result<Option<BuildRecord>, StorageError>;

    async fn latest_successful(
        &self,
        workload: &WorkloadId,
    ) -> Result<Option<BuildRecord>, StorageError>;

    /// Next monotonic build number for the workload.
    async fn next_build_number(&self, workload: &WorkloadId) -> Result<u64, StorageError>;

    async fn create(&self, build: &BuildRecord) -> Result<(), StorageError>;

    async fn update(&self, build: &BuildRecord) -> Result<(), StorageError>;

    async fn delete_build(&self, id: &BuildId) -> Result<(), StorageError>;

    async fn delete_builds_for(&self, workload: &WorkloadId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait BuildLogsRepository: Send + Sync {
    async fn append(&self, build: &BuildId, line: &LogLine) -> Result<(), StorageError>;

    async fn get_build_logs(&self, build: &BuildId) -> Result<Vec<LogLine>, StorageError>;

    async fn delete_build_logs(&self, build: &BuildId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait LocationRepository: Send + Sync {
    /// May include non-running locations.
    async fn get_all(&self, workload: &WorkloadId) -> Result<Vec<ContainerLocation>, StorageError>;

    /// Insert or update by the unique `(workload, container)` key.
    async fn upsert(&self, location: &ContainerLocation) -> Result<(), StorageError>;

    async fn update_status(
        &self,
        workload: &WorkloadId,
        container: &ContainerId,
        status: LocationStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    async fn remove(&self, workload: &WorkloadId, container: &ContainerId)
        -> Result<(), StorageError>;

    async fn remove_all(&self, workload: &WorkloadId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait RoutingRepository: Send + Sync {
    async fn get_for_workload(
        &self,
        workload: &WorkloadId,
    ) -> Result<Vec<RoutingRule>, StorageError>;

    /// Replace the workload's rule set atomically.
    async fn replace_for_workload(
        &self,
        workload: &WorkloadId,
        rules: &[RoutingRule],
    ) -> Result<(), StorageError>;
}

/// A registered worker node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub node_id: NodeId,
    pub hostname: String,
    pub base_url: String,
    pub last_seen: DateTime<Utc>,
}

#[async_trait]
pub trait NodeRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<NodeRecord>, StorageError>;

    async fn upsert(&self, node: &NodeRecord) -> Result<(), StorageError>;

    async fn get(&self, id: &NodeId) -> Result<Option<NodeRecord>, StorageError>;
}

#[async_trait]
pub trait MetricsRepository: Send + Sync {
    async fn record(&self, sample: &MetricSample) -> Result<(), StorageError>;

    /// Most recent samples for a resource, newest last.
    async fn recent(
        &self,
        resource_id: &str,
        limit: usize,
    ) -> Result<Vec<MetricSample>, StorageError>;
}
