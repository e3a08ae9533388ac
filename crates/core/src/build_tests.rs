// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn record() -> BuildRecord {
    let now = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
    BuildRecord::new(
        BuildId::new("build-1"),
        WorkloadId::new("deploy-1"),
        OrgId::new("org1"),
        1,
        BuildConfigSnapshot::default(),
        now,
    )
}

#[test]
fn starts_queued() {
    assert_eq!(record().status, BuildStatus::Queued);
}

#[test]
fn advance_through_phases() {
    let mut b = record();
    b.advance(BuildStatus::Preparing).unwrap();
    b.advance(BuildStatus::Building).unwrap();
    assert_eq!(b.status, BuildStatus::Building);
    assert!(b.completed_at.is_none());
}

#[test]
fn complete_sets_duration_and_error() {
    let mut b = record();
    let later = b.started_at + chrono::Duration::seconds(42);
    b.complete(BuildStatus::Failed, Some("boom".into()), later).unwrap();
    assert_eq!(b.status, BuildStatus::Failed);
    assert_eq!(b.error.as_deref(), Some("boom"));
    assert_eq!(b.duration_ms, Some(42_000));
}

#[test]
fn terminal_exactly_once() {
    let mut b = record();
    let now = b.started_at;
    b.complete(BuildStatus::Success, None, now).unwrap();
    assert!(matches!(
        b.complete(BuildStatus::Failed, None, now),
        Err(BuildStateError::AlreadyTerminal(_, BuildStatus::Success))
    ));
    assert!(matches!(
        b.advance(BuildStatus::Building),
        Err(BuildStateError::AlreadyTerminal(_, _))
    ));
}

#[test]
fn snapshot_source_detection() {
    let mut cfg = BuildConfigSnapshot::default();
    assert!(!cfg.has_source());
    cfg.repo_url = Some(String::new());
    assert!(!cfg.has_source());
    cfg.repo_url = Some("https://git.example/app.git".into());
    assert!(cfg.has_source());
    let dockerfile_only =
        BuildConfigSnapshot { dockerfile_path: Some("Dockerfile".into()), ..Default::default() };
    assert!(dockerfile_only.has_source());
}
