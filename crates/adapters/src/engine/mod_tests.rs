// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::fake::FakeEngine;
use super::*;

#[tokio::test]
async fn inspect_missing_container_is_not_found() {
    let engine = FakeEngine::new();
    let err = engine.inspect(&ContainerId::new("nope")).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn restarting_container_classifies_transient() {
    let engine = FakeEngine::new();
    engine.put_container(
        "c1",
        EngineState { restarting: true, ..Default::default() },
    );
    let err = engine.inspect(&ContainerId::new("c1")).await.unwrap_err();
    assert!(matches!(err, EngineError::Transient));
    let status: sv_core::Status = err.into();
    assert_eq!(status.code, sv_core::ErrorCode::FailedPrecondition);
}

#[tokio::test]
async fn label_listing_filters() {
    let engine = FakeEngine::new();
    engine.put_running("c1", "deploy-1");
    engine.put_running("c2", "deploy-2");
    let found = engine.list_by_label(WORKLOAD_LABEL, "deploy-1").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0.as_str(), "c1");
}

#[tokio::test]
async fn lifecycle_start_stop_updates_state() {
    let engine = FakeEngine::new();
    engine.put_running("c1", "deploy-1");
    engine.stop(&ContainerId::new("c1"), 30).await.unwrap();
    let state = engine.inspect(&ContainerId::new("c1")).await.unwrap();
    assert!(!state.running);
    assert_eq!(state.exit_code, Some(0));
    engine.start(&ContainerId::new("c1")).await.unwrap();
    assert!(engine.inspect(&ContainerId::new("c1")).await.unwrap().running);
}

#[tokio::test]
async fn logs_replay_then_follow() {
    let engine = FakeEngine::new();
    engine.put_running("c1", "deploy-1");
    engine.push_log("c1", StreamKind::Stdout, b"one\n");
    let mut rx = engine
        .logs(&ContainerId::new("c1"), &LogsRequest { follow: true, ..Default::default() })
        .await
        .unwrap();
    let first = rx.recv().await.unwrap().unwrap();
    assert_eq!(first.bytes, b"one\n");
    engine.push_live("c1", StreamKind::Stderr, b"two\n");
    let second = rx.recv().await.unwrap().unwrap();
    assert_eq!(second.stream, StreamKind::Stderr);
}

#[tokio::test]
async fn engine_error_maps_to_status_codes() {
    let not_found: sv_core::Status = EngineError::NotFound("x".into()).into();
    assert_eq!(not_found.code, sv_core::ErrorCode::NotFound);
    let unavailable: sv_core::Status = EngineError::Unavailable("x".into()).into();
    assert_eq!(unavailable.code, sv_core::ErrorCode::Internal);
}
