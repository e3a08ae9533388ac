// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sv_core::test_support::{fixed_now, BuildRecordBuilder, LocationBuilder, WorkloadBuilder};
use sv_core::BuildStatus;

#[tokio::test]
async fn workload_crud_and_soft_delete() {
    let store = MemoryStore::new();
    let w = WorkloadBuilder::default().build();
    WorkloadRepository::create(&store, &w).await.unwrap();
    assert!(WorkloadRepository::create(&store, &w).await.is_err());

    let fetched = store.get_by_id(&w.id).await.unwrap().unwrap();
    assert_eq!(fetched.name, "svc");

    store.delete(&w.id, fixed_now()).await.unwrap();
    let all = WorkloadRepository::get_all(&store, Some(&w.org_id), false).await.unwrap();
    assert!(all.is_empty());
    let with_deleted = WorkloadRepository::get_all(&store, Some(&w.org_id), true).await.unwrap();
    assert_eq!(with_deleted.len(), 1);
    assert_eq!(store.count(&w.org_id).await.unwrap(), 0);
}

#[tokio::test]
async fn status_listing_excludes_deleted() {
    let store = MemoryStore::new();
    let running = WorkloadBuilder::default()
        .id("deploy-a")
        .status(sv_core::LifecycleStatus::Running)
        .build();
    let mut gone = WorkloadBuilder::default()
        .id("deploy-b")
        .status(sv_core::LifecycleStatus::Running)
        .build();
    gone.deleted_at = Some(fixed_now());
    WorkloadRepository::create(&store, &running).await.unwrap();
    WorkloadRepository::create(&store, &gone).await.unwrap();

    let active = store.list_by_status(&[sv_core::LifecycleStatus::Running]).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id.as_str(), "deploy-a");
}

#[tokio::test]
async fn build_numbers_are_monotonic() {
    let store = MemoryStore::new();
    let workload = sv_core::WorkloadId::new("deploy-1");
    assert_eq!(store.next_build_number(&workload).await.unwrap(), 1);

    let b1 = BuildRecordBuilder::default().id("b1").workload("deploy-1").number(1).build();
    BuildHistoryRepository::create(&store, &b1).await.unwrap();
    assert_eq!(store.next_build_number(&workload).await.unwrap(), 2);

    let b2 = BuildRecordBuilder::default()
        .id("b2")
        .workload("deploy-1")
        .number(2)
        .status(BuildStatus::Success)
        .build();
    BuildHistoryRepository::create(&store, &b2).await.unwrap();

    let latest = store.latest_successful(&workload).await.unwrap().unwrap();
    assert_eq!(latest.id.as_str(), "b2");

    let listed = store.list_builds(&workload).await.unwrap();
    assert_eq!(listed[0].number, 2, "newest first");
}

#[tokio::test]
async fn location_upsert_is_keyed_by_workload_and_container() {
    let store = MemoryStore::new();
    let loc = LocationBuilder::default().workload("deploy-1").container("c1").build();
    LocationRepository::upsert(&store, &loc).await.unwrap();
    let mut updated = loc.clone();
    updated.host_port = Some(30000);
    LocationRepository::upsert(&store, &updated).await.unwrap();

    let all = LocationRepository::get_all(&store, &loc.workload_id).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].host_port, Some(30000));

    store.remove(&loc.workload_id, &loc.container_id).await.unwrap();
    assert!(LocationRepository::get_all(&store, &loc.workload_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn routing_replace_is_atomic() {
    let store = MemoryStore::new();
    let workload = sv_core::WorkloadId::new("deploy-1");
    let rule = sv_core::RoutingRule {
        id: "r1".into(),
        workload_id: workload.clone(),
        domain: "a.io".into(),
        service_name: None,
        path_prefix: None,
        target_port: 80,
        protocol: sv_core::Protocol::Http,
        ssl_enabled: false,
        ssl_cert_resolver: None,
        middleware_json: None,
    };
    store.replace_for_workload(&workload, std::slice::from_ref(&rule)).await.unwrap();
    store.replace_for_workload(&workload, &[]).await.unwrap();
    assert!(store.get_for_workload(&workload).await.unwrap().is_empty());
}

#[tokio::test]
async fn metrics_recent_honors_limit() {
    let store = MemoryStore::new();
    for i in 0..5 {
        let mut s = sv_core::MetricSample::zero(
            sv_core::ResourceType::Deployment,
            "deploy-1",
            fixed_now() + chrono::Duration::seconds(i),
        );
        s.memory_bytes = i as u64;
        store.record(&s).await.unwrap();
    }
    let recent = store.recent("deploy-1", 2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[1].memory_bytes, 4, "newest last");
}

#[tokio::test]
async fn build_logs_append_in_order() {
    let store = MemoryStore::new();
    let build = sv_core::BuildId::new("b1");
    for seq in 0..3 {
        let line = sv_core::LogLine {
            seq,
            at: fixed_now(),
            stream: sv_core::StreamKind::Stdout,
            line: format!("line {seq}"),
        };
        store.append(&build, &line).await.unwrap();
    }
    let lines = store.get_build_logs(&build).await.unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2].line, "line 2");
    store.delete_build_logs(&build).await.unwrap();
    assert!(store.get_build_logs(&build).await.unwrap().is_empty());
}
