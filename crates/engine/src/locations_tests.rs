// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

use sv_adapters::engine::fake::FakeEngine;
use sv_core::test_support::LocationBuilder;
use sv_core::{ErrorCode, SystemClock};
use sv_storage::MemoryStore;

fn registry(engine: &FakeEngine, store: &MemoryStore) -> LocationRegistry {
    LocationRegistry::new(
        Arc::new(engine.clone()),
        Arc::new(store.clone()),
        Arc::new(SystemClock),
        NodeId::new("node-a"),
        "node-a.internal",
    )
}

async fn seed_location(store: &MemoryStore, container: &str, running: bool) {
    let status = if running { LocationStatus::Running } else { LocationStatus::Stopped };
    let loc = LocationBuilder::default()
        .workload("deploy-1")
        .container(container)
        .status(status)
        .build();
    store.upsert(&loc).await.unwrap();
}

#[tokio::test]
async fn refresh_removes_vanished_containers() {
    let engine = FakeEngine::new();
    let store = MemoryStore::new();
    seed_location(&store, "gone0000", false).await;
    engine.put_running("alive000", "deploy-1");
    seed_location(&store, "alive000", true).await;

    let registry = registry(&engine, &store);
    let refreshed = registry.validate_and_refresh(&WorkloadId::new("deploy-1")).await.unwrap();
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].container_id.as_str(), "alive000");
}

#[tokio::test]
async fn refresh_adopts_labeled_containers() {
    let engine = FakeEngine::new();
    let store = MemoryStore::new();
    engine.put_running("c0ffee00", "deploy-1");

    let registry = registry(&engine, &store);
    let refreshed = registry.validate_and_refresh(&WorkloadId::new("deploy-1")).await.unwrap();
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].node_id.as_str(), "node-a");
    assert_eq!(refreshed[0].status, LocationStatus::Running);
}

#[tokio::test]
async fn refresh_never_invents_containers() {
    let engine = FakeEngine::new();
    let store = MemoryStore::new();
    let registry = registry(&engine, &store);
    let refreshed = registry.validate_and_refresh(&WorkloadId::new("deploy-1")).await.unwrap();
    assert!(refreshed.is_empty());
}

#[tokio::test]
async fn refresh_updates_status_drift() {
    let engine = FakeEngine::new();
    let store = MemoryStore::new();
    engine.put_running("c1000000", "deploy-1");
    engine.stop(&ContainerId::new("c1000000"), 30).await.unwrap();
    seed_location(&store, "c1000000", true).await;

    let registry = registry(&engine, &store);
    let refreshed = registry.validate_and_refresh(&WorkloadId::new("deploy-1")).await.unwrap();
    assert_eq!(refreshed[0].status, LocationStatus::Stopped);
}

#[tokio::test]
async fn find_by_container_prefix_case_insensitive() {
    let engine = FakeEngine::new();
    let store = MemoryStore::new();
    seed_location(&store, "AbCdEf0123456789", true).await;

    let registry = registry(&engine, &store);
    let found = registry
        .find(&WorkloadId::new("deploy-1"), Some("abcdef"), None, true)
        .await
        .unwrap();
    assert_eq!(found.container_id.as_str(), "AbCdEf0123456789");

    let err = registry
        .find(&WorkloadId::new("deploy-1"), Some("zzzz"), None, true)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn find_by_service_prefers_running() {
    let engine = FakeEngine::new();
    let store = MemoryStore::new();
    let stopped = LocationBuilder::default()
        .workload("deploy-1")
        .container("c1000000")
        .status(LocationStatus::Stopped)
        .service("web")
        .build();
    let running = LocationBuilder::default()
        .workload("deploy-1")
        .container("c2000000")
        .status(LocationStatus::Running)
        .service("web")
        .build();
    store.upsert(&stopped).await.unwrap();
    store.upsert(&running).await.unwrap();

    let registry = registry(&engine, &store);
    let found =
        registry.find(&WorkloadId::new("deploy-1"), None, Some("web"), true).await.unwrap();
    assert_eq!(found.container_id.as_str(), "c2000000");
}

#[tokio::test]
async fn find_by_service_falls_back_to_engine_labels() {
    let engine = FakeEngine::new();
    let store = MemoryStore::new();
    let mut labels = HashMap::new();
    labels.insert(WORKLOAD_LABEL.to_string(), "deploy-1".to_string());
    labels.insert(COMPOSE_SERVICE_LABEL.to_string(), "db".to_string());
    engine.put_container(
        "c3000000",
        sv_adapters::engine::EngineState {
            running: true,
            status: LocationStatus::Running,
            labels,
            ..Default::default()
        },
    );
    seed_location(&store, "c3000000", true).await;

    let registry = registry(&engine, &store);
    let found =
        registry.find(&WorkloadId::new("deploy-1"), None, Some("db"), true).await.unwrap();
    assert_eq!(found.container_id.as_str(), "c3000000");
}

#[tokio::test]
async fn find_default_prefers_running_then_first() {
    let engine = FakeEngine::new();
    let store = MemoryStore::new();
    seed_location(&store, "c1000000", false).await;
    seed_location(&store, "c2000000", true).await;

    let registry = registry(&engine, &store);
    let found = registry.find(&WorkloadId::new("deploy-1"), None, None, true).await.unwrap();
    assert_eq!(found.container_id.as_str(), "c2000000");

    let first = registry.find(&WorkloadId::new("deploy-1"), None, None, false).await.unwrap();
    assert_eq!(first.container_id.as_str(), "c1000000");
}

#[tokio::test]
async fn find_with_no_locations_is_not_found() {
    let engine = FakeEngine::new();
    let store = MemoryStore::new();
    let registry = registry(&engine, &store);
    let err = registry.find(&WorkloadId::new("deploy-1"), None, None, true).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}
