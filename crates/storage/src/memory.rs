// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory implementation of every repository trait.
//!
//! Backs tests and single-node development mode. Data lives behind
//! `parking_lot` locks; each trait family gets its own map so lock scopes
//! stay small.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use sv_core::{
    BuildId, BuildRecord, ContainerId, ContainerLocation, LifecycleStatus, LocationStatus,
    LogLine, MetricSample, NodeId, OrgId, RoutingRule, Workload, WorkloadHealth, WorkloadId,
};

use crate::error::StorageError;
use crate::repo::{
    BuildHistoryRepository, BuildLogsRepository, LocationRepository, MetricsRepository,
    NodeRecord, NodeRepository, RoutingRepository, WorkloadRepository,
};

/// Every repository in one shareable store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    workloads: Arc<RwLock<HashMap<WorkloadId, Workload>>>,
    builds: Arc<RwLock<HashMap<BuildId, BuildRecord>>>,
    build_logs: Arc<RwLock<HashMap<BuildId, Vec<LogLine>>>>,
    locations: Arc<RwLock<Vec<ContainerLocation>>>,
    routings: Arc<RwLock<HashMap<WorkloadId, Vec<RoutingRule>>>>,
    nodes: Arc<RwLock<HashMap<NodeId, NodeRecord>>>,
    metrics: Arc<RwLock<HashMap<String, Vec<MetricSample>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkloadRepository for MemoryStore {
    async fn get_all(
        &self,
        org: Option<&OrgId>,
        include_deleted: bool,
    ) -> Result<Vec<Workload>, StorageError> {
        let mut out: Vec<_> = self
            .workloads
            .read()
            .values()
            .filter(|w| org.is_none_or(|o| &w.org_id == o))
            .filter(|w| include_deleted || !w.is_deleted())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn get_by_id(&self, id: &WorkloadId) -> Result<Option<Workload>, StorageError> {
        Ok(self.workloads.read().get(id.as_str()).cloned())
    }

    async fn list_by_status(
        &self,
        statuses: &[LifecycleStatus],
    ) -> Result<Vec<Workload>, StorageError> {
        let mut out: Vec<_> = self
            .workloads
            .read()
            .values()
            .filter(|w| !w.is_deleted() && statuses.contains(&w.status))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn create(&self, workload: &Workload) -> Result<(), StorageError> {
        let mut map = self.workloads.write();
        if map.contains_key(workload.id.as_str()) {
            return Err(StorageError::Conflict(format!("workload {} exists", workload.id)));
        }
        map.insert(workload.id.clone(), workload.clone());
        Ok(())
    }

    async fn update(&self, workload: &Workload) -> Result<(), StorageError> {
        let mut map = self.workloads.write();
        if !map.contains_key(workload.id.as_str()) {
            return Err(StorageError::NotFound(format!("workload {}", workload.id)));
        }
        map.insert(workload.id.clone(), workload.clone());
        Ok(())
    }

    async fn delete(&self, id: &WorkloadId, now: DateTime<Utc>) -> Result<(), StorageError> {
        let mut map = self.workloads.write();
        let w = map
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::NotFound(format!("workload {id}")))?;
        w.deleted_at = Some(now);
        w.updated_at = now;
        Ok(())
    }

    async fn update_status(
        &self,
        id: &WorkloadId,
        status: LifecycleStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut map = self.workloads.write();
        let w = map
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::NotFound(format!("workload {id}")))?;
        w.status = status;
        w.updated_at = now;
        Ok(())
    }

    async fn update_health(
        &self,
        id: &WorkloadId,
        health: WorkloadHealth,
    ) -> Result<(), StorageError> {
        let mut map = self.workloads.write();
        let w = map
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::NotFound(format!("workload {id}")))?;
        w.health = health;
        Ok(())
    }

    async fn count(&self, org: &OrgId) -> Result<u64, StorageError> {
        Ok(self
            .workloads
            .read()
            .values()
            .filter(|w| &w.org_id == org && !w.is_deleted())
            .count() as u64)
    }
}

#[async_trait]
impl BuildHistoryRepository for MemoryStore {
    async fn list_builds(&self, workload: &WorkloadId) -> Result<Vec<BuildRecord>, StorageError> {
        let mut out: Vec<_> = self
            .builds
            .read()
            .values()
            .filter(|b| &b.workload_id == workload)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.number.cmp(&a.number));
        Ok(out)
    }

    async fn get_build(&self, id: &BuildId) -> Result<Option<BuildRecord>, StorageError> {
        Ok(self.builds.read().get(id.as_str()).cloned())
    }

    async fn latest_successful(
        &self,
        workload: &WorkloadId,
    ) -> Result<Option<BuildRecord>, StorageError> {
        Ok(self
            .builds
            .read()
            .values()
            .filter(|b| &b.workload_id == workload && b.status == sv_core::BuildStatus::Success)
            .max_by_key(|b| b.number)
            .cloned())
    }

    async fn next_build_number(&self, workload: &WorkloadId) -> Result<u64, StorageError> {
        Ok(self
            .builds
            .read()
            .values()
            .filter(|b| &b.workload_id == workload)
            .map(|b| b.number)
            .max()
            .unwrap_or(0)
            + 1)
    }

    async fn create(&self, build: &BuildRecord) -> Result<(), StorageError> {
        let mut map = self.builds.write();
        if map.contains_key(build.id.as_str()) {
            return Err(StorageError::Conflict(format!("build {} exists", build.id)));
        }
        map.insert(build.id.clone(), build.clone());
        Ok(())
    }

    async fn update(&self, build: &BuildRecord) -> Result<(), StorageError> {
        let mut map = self.builds.write();
        if !map.contains_key(build.id.as_str()) {
            return Err(StorageError::NotFound(format!("build {}", build.id)));
        }
        map.insert(build.id.clone(), build.clone());
        Ok(())
    }

    async fn delete_build(&self, id: &BuildId) -> Result<(), StorageError> {
        self.builds
            .write()
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("build {id}")))
    }

    async fn delete_builds_for(&self, workload: &WorkloadId) -> Result<(), StorageError> {
        self.builds.write().retain(|_, b| &b.workload_id != workload);
        Ok(())
    }
}

#[async_trait]
impl BuildLogsRepository for MemoryStore {
    async fn append(&self, build: &BuildId, line: &LogLine) -> Result<(), StorageError> {
        self.build_logs.write().entry(build.clone()).or_default().push(line.clone());
        Ok(())
    }

    async fn get_build_logs(&self, build: &BuildId) -> Result<Vec<LogLine>, StorageError> {
        Ok(self.build_logs.read().get(build.as_str()).cloned().unwrap_or_default())
    }

    async fn delete_build_logs(&self, build: &BuildId) -> Result<(), StorageError> {
        self.build_logs.write().remove(build.as_str());
        Ok(())
    }
}

#[async_trait]
impl LocationRepository for MemoryStore {
    async fn get_all(&self, workload: &WorkloadId) -> Result<Vec<ContainerLocation>, StorageError> {
        Ok(self
            .locations
            .read()
            .iter()
            .filter(|l| &l.workload_id == workload)
            .cloned()
            .collect())
    }

    async fn upsert(&self, location: &ContainerLocation) -> Result<(), StorageError> {
        let mut rows = self.locations.write();
        match rows.iter_mut().find(|l| {
            l.workload_id == location.workload_id && l.container_id == location.container_id
        }) {
            Some(existing) => *existing = location.clone(),
            None => rows.push(location.clone()),
        }
        Ok(())
    }

    async fn update_status(
        &self,
        workload: &WorkloadId,
        container: &ContainerId,
        status: LocationStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut rows = self.locations.write();
        let row = rows
            .iter_mut()
            .find(|l| &l.workload_id == workload && &l.container_id == container)
            .ok_or_else(|| StorageError::NotFound(format!("location {workload}/{container}")))?;
        row.status = status;
        row.updated_at = now;
        Ok(())
    }

    async fn remove(
        &self,
        workload: &WorkloadId,
        container: &ContainerId,
    ) -> Result<(), StorageError> {
        self.locations
            .write()
            .retain(|l| !(&l.workload_id == workload && &l.container_id == container));
        Ok(())
    }

    async fn remove_all(&self, workload: &WorkloadId) -> Result<(), StorageError> {
        self.locations.write().retain(|l| &l.workload_id != workload);
        Ok(())
    }
}

#[async_trait]
impl RoutingRepository for MemoryStore {
    async fn get_for_workload(
        &self,
        workload: &WorkloadId,
    ) -> Result<Vec<RoutingRule>, StorageError> {
        Ok(self.routings.read().get(workload.as_str()).cloned().unwrap_or_default())
    }

    async fn replace_for_workload(
        &self,
        workload: &WorkloadId,
        rules: &[RoutingRule],
    ) -> Result<(), StorageError> {
        self.routings.write().insert(workload.clone(), rules.to_vec());
        Ok(())
    }
}

#[async_trait]
impl NodeRepository for MemoryStore {
    async fn list(&self) -> Result<Vec<NodeRecord>, StorageError> {
        let mut out: Vec<_> = self.nodes.read().values().cloned().collect();
        out.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        Ok(out)
    }

    async fn upsert(&self, node: &NodeRecord) -> Result<(), StorageError> {
        self.nodes.write().insert(node.node_id.clone(), node.clone());
        Ok(())
    }

    async fn get(&self, id: &NodeId) -> Result<Option<NodeRecord>, StorageError> {
        Ok(self.nodes.read().get(id.as_str()).cloned())
    }
}

#[async_trait]
impl MetricsRepository for MemoryStore {
    async fn record(&self, sample: &MetricSample) -> Result<(), StorageError> {
        self.metrics
            .write()
            .entry(sample.resource_id.clone())
            .or_default()
            .push(sample.clone());
        Ok(())
    }

    async fn recent(
        &self,
        resource_id: &str,
        limit: usize,
    ) -> Result<Vec<MetricSample>, StorageError> {
        let map = self.metrics.read();
        let samples = map.get(resource_id).cloned().unwrap_or_default();
        let start = samples.len().saturating_sub(limit);
        Ok(samples[start..].to_vec())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
