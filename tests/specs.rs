// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level behavioural tests: the flows that cross crate
//! boundaries, driven over the fake engine and the in-memory store.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use sv_adapters::engine::ContainerEngine as _;
use sv_core::{CallContext, LifecycleStatus, OrgId, UserId, WorkloadId, WorkloadKind};
use sv_engine::test_support::harness;
use sv_engine::{NewWorkload, Reconciler, StartGate};
use sv_storage::{LocationRepository, WorkloadRepository};

fn ctx() -> CallContext {
    CallContext::for_user(UserId::new("u1"))
}

/// Create → deploy → node loses the container → one reconciler sweep
/// brings the workload back to Running with a fresh container.
#[tokio::test]
async fn deploy_survives_container_loss_via_reconciler() {
    let h = harness();
    let lifecycle = h.lifecycle();
    let w = lifecycle
        .create_workload(
            &ctx(),
            &OrgId::new("org1"),
            WorkloadKind::Deployment,
            NewWorkload { name: "svc".into(), image: Some("nginx:latest".into()), ..Default::default() },
        )
        .await
        .unwrap();
    lifecycle.deploy(&ctx(), &w.id).await.unwrap();

    let original = LocationRepository::get_all(&h.store, &w.id).await.unwrap()[0]
        .container_id
        .clone();
    h.engine.remove(&original, true).await.unwrap();

    let stats = Reconciler::new(h.lifecycle()).sweep().await;
    assert_eq!(stats.redeployed, 1);
    assert_eq!(stats.errors, 0);

    let after = LocationRepository::get_all(&h.store, &w.id).await.unwrap();
    assert_eq!(after.len(), 1);
    assert_ne!(after[0].container_id, original);
    assert!(after[0].is_running());
    let reloaded = h.store.get_by_id(&w.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, LifecycleStatus::Running);
}

/// Stopped deployments drift back to Stopped, and a second sweep leaves
/// everything untouched (the sweep is idempotent on a settled fleet).
#[tokio::test]
async fn reconciler_sweep_is_idempotent_once_settled() {
    let h = harness();
    let lifecycle = h.lifecycle();
    let w = lifecycle
        .create_workload(
            &ctx(),
            &OrgId::new("org1"),
            WorkloadKind::Deployment,
            NewWorkload { name: "svc".into(), image: Some("nginx:latest".into()), ..Default::default() },
        )
        .await
        .unwrap();
    lifecycle.deploy(&ctx(), &w.id).await.unwrap();

    let container = LocationRepository::get_all(&h.store, &w.id).await.unwrap()[0]
        .container_id
        .clone();
    h.engine.stop(&container, 1).await.unwrap();

    let reconciler = Reconciler::new(h.lifecycle());
    reconciler.sweep().await;
    let after_first = h.store.get_by_id(&w.id).await.unwrap().unwrap();
    assert_eq!(after_first.status, LifecycleStatus::Stopped);

    // A stopped deployment is not in the sweep's candidate set anymore.
    let stats = reconciler.sweep().await;
    assert_eq!(stats.redeployed, 0);
    assert_eq!(stats.errors, 0);
}

/// Build-log subscribers get replay-then-live continuity: the first
/// delivered line is the oldest buffered line at subscribe time.
#[tokio::test]
async fn build_log_replay_then_live_continuity() {
    let h = harness();
    let workload = WorkloadId::new("deploy-x");
    let hub = &h.runtime.build_logs;

    hub.write(&workload, sv_core::StreamKind::Stdout, "step 1");
    hub.write(&workload, sv_core::StreamKind::Stdout, "step 2");

    let (snapshot, mut live) = hub.subscribe(&workload);
    assert_eq!(snapshot.first().map(|l| l.line.as_str()), Some("step 1"));

    hub.write(&workload, sv_core::StreamKind::Stderr, "step 3");
    let next = live.recv().await.unwrap();
    assert_eq!(next.line, "step 3");
    assert_eq!(next.seq, snapshot.last().unwrap().seq + 1);
}

/// The chunk manager honors the documented idempotence: a duplicate
/// chunk leaves the session byte-for-byte identical.
#[tokio::test]
async fn duplicate_chunks_do_not_change_session_state() {
    let h = harness();
    let chunks = &h.runtime.chunks;
    let payload = sv_wire::ChunkedUploadPayload {
        file_name: "map.zip".into(),
        file_size: 4,
        total_chunks: 2,
        chunk_index: 0,
        chunk_data: b"ab".to_vec(),
        volume_name: None,
        destination_path: "/maps".into(),
        file_mode: None,
    };
    let first = chunks.store_chunk("gs-1", &payload).unwrap();
    let second = chunks.store_chunk("gs-1", &payload).unwrap();
    assert_eq!(first, second);

    let mut tail = payload.clone();
    tail.chunk_index = 1;
    tail.chunk_data = b"cd".to_vec();
    chunks.store_chunk("gs-1", &tail).unwrap();
    assert_eq!(chunks.assemble("gs-1", "map.zip", 2).unwrap(), b"abcd");
}

/// Stopped-mode terminal gate: `start` typed with a stray prefix still
/// needs an exact word; the engine only starts on the exact command.
#[tokio::test]
async fn terminal_start_gate_drives_lifecycle() {
    let h = harness();
    let lifecycle = h.lifecycle();
    let w = lifecycle
        .create_workload(
            &ctx(),
            &OrgId::new("org1"),
            WorkloadKind::GameServer,
            NewWorkload { name: "mc".into(), image: Some("itzg/minecraft-server".into()), ..Default::default() },
        )
        .await
        .unwrap();
    lifecycle.deploy(&ctx(), &w.id).await.unwrap();
    let container = LocationRepository::get_all(&h.store, &w.id).await.unwrap()[0]
        .container_id
        .clone();
    h.engine.stop(&container, 1).await.unwrap();

    let mut gate = StartGate::new();
    assert!(!gate
        .feed(b"stop\r")
        .iter()
        .any(|a| matches!(a, sv_engine::GateAction::Start)));
    let fired = gate
        .feed(b"start\r")
        .iter()
        .any(|a| matches!(a, sv_engine::GateAction::Start));
    assert!(fired);

    lifecycle
        .start_container(&ctx(), &w.id, Some(container.as_str()), None)
        .await
        .unwrap();
    assert!(h.engine.contains(container.as_str()));
    let state = h.engine.inspect(&container).await.unwrap();
    assert!(state.running);
}

/// Compose-defined workloads materialize one labeled container per
/// service, and the location registry finds them by service name.
#[tokio::test]
async fn compose_services_resolve_by_name() {
    let h = harness();
    let lifecycle = h.lifecycle();
    let yaml = "services:\n  web:\n    image: nginx:latest\n  db:\n    image: postgres:16\n";
    let w = lifecycle
        .create_workload(
            &ctx(),
            &OrgId::new("org1"),
            WorkloadKind::Deployment,
            NewWorkload { name: "svc".into(), compose_yaml: Some(yaml.into()), ..Default::default() },
        )
        .await
        .unwrap();
    lifecycle.deploy(&ctx(), &w.id).await.unwrap();

    let db = lifecycle.registry().find(&w.id, None, Some("db"), true).await.unwrap();
    assert_eq!(db.service_name.as_deref(), Some("db"));
    assert!(db.is_running());

    let by_prefix = lifecycle
        .registry()
        .find(&w.id, Some(&db.container_id.as_str()[..6].to_uppercase()), None, true)
        .await
        .unwrap();
    assert_eq!(by_prefix.container_id, db.container_id);
}
