// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runtime context.
//!
//! One [`Runtime`] per process bundles the engine facade, repositories,
//! collaborator contracts, and the process-local streaming state. Tests
//! build a fresh runtime per case instead of touching globals.

use std::sync::Arc;

use async_trait::async_trait;

use sv_adapters::ContainerEngine;
use sv_core::{
    Allocation, CallContext, Clock, NodeId, OrgId, PermissionChecker, QuotaChecker,
    ScopedPermission, Status,
};
use sv_storage::{
    BuildHistoryRepository, BuildLogsRepository, LocationRepository, MetricsRepository,
    NodeRepository, RoutingRepository, WorkloadRepository,
};

use crate::audit::AuditSink;
use crate::buildlog::BuildLogHub;
use crate::chunks::ChunkManager;
use crate::lifecycle::BuildExecutor;
use crate::metrics::MetricsStreamer;
use crate::terminal::TerminalSessions;

/// Everything the control plane needs, cheaply cloneable.
#[derive(Clone)]
pub struct Runtime {
    pub engine: Arc<dyn ContainerEngine>,
    pub workloads: Arc<dyn WorkloadRepository>,
    pub builds: Arc<dyn BuildHistoryRepository>,
    pub build_logs_repo: Arc<dyn BuildLogsRepository>,
    pub locations_repo: Arc<dyn LocationRepository>,
    pub routings: Arc<dyn RoutingRepository>,
    pub nodes: Arc<dyn NodeRepository>,
    pub metrics_repo: Arc<dyn MetricsRepository>,
    pub permissions: Arc<dyn PermissionChecker>,
    pub quotas: Arc<dyn QuotaChecker>,
    pub build_executor: Arc<dyn BuildExecutor>,
    pub audit: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,

    /// This node's identity in the location table.
    pub node_id: NodeId,
    pub node_host: String,
    /// Base domain for generated default domains.
    pub base_domain: String,

    // Process-local streaming state.
    pub build_logs: BuildLogHub,
    pub metrics: MetricsStreamer,
    pub chunks: ChunkManager,
    pub terminals: TerminalSessions,
}

impl Runtime {
    /// Permission gate; system contexts bypass the checker.
    pub async fn check_permission(
        &self,
        ctx: &CallContext,
        org: &OrgId,
        scoped: &ScopedPermission,
    ) -> Result<(), Status> {
        if ctx.is_system() {
            return Ok(());
        }
        self.permissions.check_scoped(ctx, org, scoped).await
    }

    /// Quota gate; system contexts bypass it too.
    pub async fn check_quota(
        &self,
        ctx: &CallContext,
        org: &OrgId,
        allocation: &Allocation,
    ) -> Result<(), Status> {
        if ctx.is_system() {
            return Ok(());
        }
        self.quotas.can_allocate(org, allocation).await
    }
}

/// Permission checker that allows everything; development mode
/// (`DISABLE_AUTH=true`) and tests.
#[derive(Debug, Clone, Default)]
pub struct AllowAllPermissions;

#[async_trait]
impl PermissionChecker for AllowAllPermissions {
    async fn check_scoped(
        &self,
        _ctx: &CallContext,
        _org: &OrgId,
        _scoped: &ScopedPermission,
    ) -> Result<(), Status> {
        Ok(())
    }
}

/// Quota checker that never refuses.
#[derive(Debug, Clone, Default)]
pub struct UnlimitedQuota;

#[async_trait]
impl QuotaChecker for UnlimitedQuota {
    async fn can_allocate(&self, _org: &OrgId, _allocation: &Allocation) -> Result<(), Status> {
        Ok(())
    }
}
