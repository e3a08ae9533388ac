// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

use sv_adapters::engine::fake::FakeEngine;
use sv_core::SystemClock;

fn event(kind: EngineEventKind, action: &str, actor: &str) -> EngineEvent {
    EngineEvent {
        kind,
        action: action.to_string(),
        actor_id: actor.to_string(),
        actor_name: Some("svc-web".to_string()),
        labels: HashMap::new(),
        at: Utc::now(),
    }
}

#[test]
fn event_formatting_covers_the_action_set() {
    let e = event(EngineEventKind::Container, "start", "c1");
    assert_eq!(format_engine_event(&e).unwrap(), "[engine] start container svc-web");

    let e = event(EngineEventKind::Image, "pull", "nginx:latest");
    assert_eq!(format_engine_event(&e).unwrap(), "[engine] pull image svc-web");

    let e = event(EngineEventKind::Container, "health_status: healthy", "c1");
    assert_eq!(
        format_engine_event(&e).unwrap(),
        "[engine] health_status: healthy container svc-web"
    );

    let e = event(EngineEventKind::Container, "exec_create", "c1");
    assert_eq!(format_engine_event(&e), None);
}

#[test]
fn unnamed_actor_falls_back_to_short_id() {
    let mut e = event(EngineEventKind::Container, "die", "0123456789abcdef0123");
    e.actor_name = None;
    assert_eq!(format_engine_event(&e).unwrap(), "[engine] die container 0123456789ab");
}

#[test]
fn event_workload_matching() {
    let workload = WorkloadId::new("deploy-1");
    let containers = vec![ContainerId::new("c1000000deadbeef")];
    let images = vec!["registry/app:1".to_string()];

    let mut labeled = event(EngineEventKind::Container, "start", "other");
    labeled.labels.insert(WORKLOAD_LABEL.to_string(), "deploy-1".to_string());
    assert!(event_matches_workload(&labeled, &workload, &containers, &images));

    let by_container = event(EngineEventKind::Container, "start", "c1000000");
    assert!(event_matches_workload(&by_container, &workload, &containers, &images));

    let by_image = event(EngineEventKind::Image, "pull", "registry/app:1");
    assert!(event_matches_workload(&by_image, &workload, &containers, &images));

    let unrelated = event(EngineEventKind::Container, "start", "zzzz");
    assert!(!event_matches_workload(&unrelated, &workload, &containers, &images));
}

#[test]
fn line_splitter_handles_partials_and_crlf() {
    let mut splitter = LineSplitter::new();
    assert!(splitter.feed(b"hel").is_empty());
    let lines = splitter.feed(b"lo\r\nwor");
    assert_eq!(lines, vec![b"hello".to_vec()]);
    let lines = splitter.feed(b"ld\n");
    assert_eq!(lines, vec![b"world".to_vec()]);
    assert_eq!(splitter.flush(), None);

    splitter.feed(b"tail");
    assert_eq!(splitter.flush(), Some(b"tail".to_vec()));
}

#[test]
fn prepare_line_sanitizes_and_classifies() {
    let line = prepare_line(
        b"\x1b[31m[12:00:00] ERROR boom\x1b[0m",
        StreamKind::Stderr,
        "c1",
        Utc::now(),
    );
    assert_eq!(line.message, "ERROR boom");
    assert_eq!(line.level, LogLevel::Error);
    assert_eq!(line.source, "c1");
}

#[tokio::test]
async fn stopped_container_replays_without_following() {
    let engine = FakeEngine::new();
    engine.put_running("c1000000", "deploy-1");
    engine.push_log("c1000000", StreamKind::Stdout, b"historical line\n");
    engine.stop(&ContainerId::new("c1000000"), 30).await.unwrap();

    let cancel = CancellationToken::new();
    let mut rx = stream_container_logs(
        Arc::new(engine),
        Arc::new(SystemClock),
        WorkloadId::new("deploy-1"),
        ContainerId::new("c1000000"),
        vec![ContainerId::new("c1000000")],
        vec![],
        None,
        cancel,
    )
    .await
    .unwrap();

    let line = rx.recv().await.unwrap();
    assert_eq!(line.message, "historical line");
    // Stream ends: not following a stopped container.
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn running_container_merges_live_events() {
    let engine = FakeEngine::new();
    engine.put_running("c1000000", "deploy-1");

    let cancel = CancellationToken::new();
    let mut rx = stream_container_logs(
        Arc::new(engine.clone()),
        Arc::new(SystemClock),
        WorkloadId::new("deploy-1"),
        ContainerId::new("c1000000"),
        vec![ContainerId::new("c1000000")],
        vec![],
        None,
        cancel.clone(),
    )
    .await
    .unwrap();

    engine.push_live("c1000000", StreamKind::Stdout, b"app output\n");
    let first = rx.recv().await.unwrap();
    assert_eq!(first.message, "app output");

    let mut restart = event(EngineEventKind::Container, "restart", "c1000000");
    restart.actor_name = Some("svc".to_string());
    engine.emit_event(restart);
    let second = rx.recv().await.unwrap();
    assert_eq!(second.message, "[engine] restart container svc");
    assert_eq!(second.source, "engine");
    cancel.cancel();
}
