// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health monitor: the periodic sweep that drives actual container state
//! toward the persisted desired state.
//!
//! Single-flight per process: a running sweep completes before the next
//! tick fires. The reconciler never fails the process; outcomes are
//! counters and logs.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sv_core::{CallContext, LifecycleStatus, WorkloadId};

use crate::lifecycle::LifecycleEngine;

/// Default sweep period.
pub const SWEEP_PERIOD: Duration = Duration::from_secs(30);

/// Counters from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub redeployed: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub struct Reconciler {
    lifecycle: LifecycleEngine,
    period: Duration,
}

impl Reconciler {
    pub fn new(lifecycle: LifecycleEngine) -> Self {
        Self { lifecycle, period: SWEEP_PERIOD }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Run until cancelled. One sweep at a time.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let stats = self.sweep().await;
            if stats != SweepStats::default() {
                info!(
                    redeployed = stats.redeployed,
                    skipped = stats.skipped,
                    errors = stats.errors,
                    "reconciler sweep"
                );
            }
        }
    }

    /// One pass over every workload that should be running.
    pub async fn sweep(&self) -> SweepStats {
        let mut stats = SweepStats::default();
        let rt = self.lifecycle.runtime();

        let active = match rt
            .workloads
            .list_by_status(&[LifecycleStatus::Running, LifecycleStatus::Deploying])
            .await
        {
            Ok(workloads) => workloads,
            Err(e) => {
                warn!(error = %e, "reconciler could not enumerate workloads");
                stats.errors += 1;
                return stats;
            }
        };

        for workload in active {
            match self.reconcile_one(&workload.id).await {
                Ok(true) => stats.redeployed += 1,
                Ok(false) => stats.skipped += 1,
                Err(e) => {
                    warn!(workload_id = %workload.id, error = %e, "reconcile failed");
                    stats.errors += 1;
                }
            }
        }
        stats
    }

    /// Returns whether an auto-redeploy was performed.
    async fn reconcile_one(&self, id: &WorkloadId) -> Result<bool, sv_core::Status> {
        let registry = self.lifecycle.registry();
        let observed = registry.validate_and_refresh_observed(id).await?;

        if observed.is_empty() {
            // Nothing materialized anywhere: recover under a system
            // context that bypasses permission checks.
            self.lifecycle.auto_redeploy(&CallContext::system(), id).await?;
            return Ok(true);
        }

        let workload = self
            .lifecycle
            .runtime()
            .workloads
            .get_by_id(id)
            .await?
            .ok_or_else(|| sv_core::Status::not_found(format!("workload {id} vanished")))?;
        self.lifecycle.sync_status_from_observed(&workload, &observed).await?;
        Ok(false)
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
