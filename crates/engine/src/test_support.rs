// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Harness helpers: a fresh runtime over fakes for every test case.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use sv_adapters::engine::fake::FakeEngine;
use sv_core::{BuildRecord, FakeClock, NodeId, Status, Workload};
use sv_storage::MemoryStore;

use crate::audit::MemoryAuditSink;
use crate::buildlog::BuildLogHub;
use crate::chunks::ChunkManager;
use crate::lifecycle::{BuildExecutor, BuildOutcome, LifecycleEngine};
use crate::metrics::MetricsStreamer;
use crate::runtime::{AllowAllPermissions, Runtime, UnlimitedQuota};
use crate::terminal::TerminalSessions;

/// Build executor whose next result is scripted by the test.
#[derive(Clone, Default)]
pub struct ScriptedBuildExecutor {
    result: Arc<Mutex<Option<Result<BuildOutcome, Status>>>>,
    runs: Arc<Mutex<u32>>,
}

impl ScriptedBuildExecutor {
    pub fn succeed_with(&self, outcome: BuildOutcome) {
        *self.result.lock() = Some(Ok(outcome));
    }

    pub fn fail_with(&self, status: Status) {
        *self.result.lock() = Some(Err(status));
    }

    pub fn runs(&self) -> u32 {
        *self.runs.lock()
    }
}

#[async_trait]
impl BuildExecutor for ScriptedBuildExecutor {
    async fn execute(
        &self,
        _workload: &Workload,
        _build: &BuildRecord,
        _logs: &BuildLogHub,
    ) -> Result<BuildOutcome, Status> {
        *self.runs.lock() += 1;
        self.result
            .lock()
            .clone()
            .unwrap_or_else(|| Err(Status::failed_precondition("no scripted build result")))
    }
}

/// Everything a test needs, with handles kept on the fakes.
pub struct TestHarness {
    pub engine: FakeEngine,
    pub store: MemoryStore,
    pub clock: FakeClock,
    pub audit: MemoryAuditSink,
    pub executor: ScriptedBuildExecutor,
    pub runtime: Runtime,
}

impl TestHarness {
    pub fn lifecycle(&self) -> LifecycleEngine {
        LifecycleEngine::new(self.runtime.clone())
    }
}

/// Fresh runtime over fakes; node `node-a`, base domain
/// `my.obiente.cloud`, deterministic clock.
pub fn harness() -> TestHarness {
    let engine = FakeEngine::new();
    let store = MemoryStore::new();
    let clock = FakeClock::new();
    clock.set(sv_core::test_support::fixed_now());
    let audit = MemoryAuditSink::default();
    let executor = ScriptedBuildExecutor::default();

    let clock_arc: Arc<dyn sv_core::Clock> = Arc::new(clock.clone());
    let runtime = Runtime {
        engine: Arc::new(engine.clone()),
        workloads: Arc::new(store.clone()),
        builds: Arc::new(store.clone()),
        build_logs_repo: Arc::new(store.clone()),
        locations_repo: Arc::new(store.clone()),
        routings: Arc::new(store.clone()),
        nodes: Arc::new(store.clone()),
        metrics_repo: Arc::new(store.clone()),
        permissions: Arc::new(AllowAllPermissions),
        quotas: Arc::new(UnlimitedQuota),
        build_executor: Arc::new(executor.clone()),
        audit: Arc::new(audit.clone()),
        clock: Arc::clone(&clock_arc),
        node_id: NodeId::new("node-a"),
        node_host: "node-a.internal".to_string(),
        base_domain: "my.obiente.cloud".to_string(),
        build_logs: BuildLogHub::new(Arc::new(store.clone()), Arc::clone(&clock_arc)),
        metrics: MetricsStreamer::new(),
        chunks: ChunkManager::new(clock_arc),
        terminals: TerminalSessions::new(),
    };

    TestHarness { engine, store, clock, audit, executor, runtime }
}
