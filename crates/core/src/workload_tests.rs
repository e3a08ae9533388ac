// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::domain::CustomDomain;
use chrono::TimeZone;

fn base() -> Workload {
    let now = Utc.timestamp_opt(1_722_470_400, 0).single().unwrap();
    Workload::new(
        fresh_workload_id(WorkloadKind::Deployment, now.timestamp()),
        OrgId::new("org1"),
        "svc",
        UserId::new("u1"),
        WorkloadKind::Deployment,
        now,
    )
}

#[test]
fn new_workload_matches_creation_contract() {
    let w = base();
    assert_eq!(w.id.as_str(), "deploy-1722470400");
    assert_eq!(w.status, LifecycleStatus::Created);
    assert!(w.env.is_empty());
    assert!(w.groups.is_empty());
    assert!(w.custom_domains.is_empty());
    assert_eq!(w.default_domain("my.obiente.cloud"), "deploy-1722470400.my.obiente.cloud");
    assert!(w.validate().is_ok());
}

#[test]
fn gs_prefix() {
    assert_eq!(fresh_workload_id(WorkloadKind::GameServer, 7).as_str(), "gs-7");
}

#[test]
fn image_and_compose_are_exclusive() {
    let mut w = base();
    w.image = Some("nginx:latest".into());
    w.compose_yaml = Some("services:\n  web:\n    image: nginx\n".into());
    assert_eq!(w.validate(), Err(WorkloadValidationError::ImageAndCompose));
}

#[test]
fn blank_compose_does_not_count() {
    let mut w = base();
    w.image = Some("nginx:latest".into());
    w.compose_yaml = Some("   ".into());
    assert!(!w.is_compose());
    assert!(w.validate().is_ok());
}

#[test]
fn zero_cpu_shares_rejected() {
    let mut w = base();
    w.envelope.cpu_shares = Some(0);
    assert_eq!(w.validate(), Err(WorkloadValidationError::ZeroCpuShares));
}

#[test]
fn port_zero_rejected() {
    let mut w = base();
    w.envelope.port = Some(0);
    assert!(matches!(w.validate(), Err(WorkloadValidationError::PortOutOfRange(0))));
}

#[test]
fn duplicate_domains_rejected_case_insensitively() {
    let mut w = base();
    w.custom_domains = vec![
        CustomDomain::Plain { domain: "App.io".into() },
        CustomDomain::Plain { domain: "app.IO".into() },
    ];
    assert!(matches!(w.validate(), Err(WorkloadValidationError::DuplicateDomain(_))));
}

#[test]
fn envelope_raise_detection() {
    let current = ResourceEnvelope { replicas: 1, memory_bytes: Some(512), cpu_shares: None, port: None };
    let same = current.clone();
    let more_replicas = ResourceEnvelope { replicas: 2, ..current.clone() };
    let more_memory = ResourceEnvelope { memory_bytes: Some(1024), ..current.clone() };
    assert!(!current.raised_by(&same));
    assert!(current.raised_by(&more_replicas));
    assert!(current.raised_by(&more_memory));
}

#[test]
fn soft_delete_marker() {
    let mut w = base();
    assert!(!w.is_deleted());
    w.deleted_at = Some(w.created_at);
    assert!(w.is_deleted());
}
