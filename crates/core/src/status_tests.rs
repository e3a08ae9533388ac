// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn lifecycle_codes_follow_numeric_order() {
    let ordered = [
        LifecycleStatus::Unspecified,
        LifecycleStatus::Created,
        LifecycleStatus::Building,
        LifecycleStatus::Deploying,
        LifecycleStatus::Running,
        LifecycleStatus::Stopped,
        LifecycleStatus::Failed,
    ];
    for (i, status) in ordered.iter().enumerate() {
        assert_eq!(status.code(), i as i32);
    }
}

#[parameterized(
    running = { LifecycleStatus::Running, true },
    deploying = { LifecycleStatus::Deploying, true },
    created = { LifecycleStatus::Created, false },
    stopped = { LifecycleStatus::Stopped, false },
    failed = { LifecycleStatus::Failed, false },
)]
fn lifecycle_is_active(status: LifecycleStatus, active: bool) {
    assert_eq!(status.is_active(), active);
}

#[test]
fn build_terminal_states() {
    assert!(BuildStatus::Success.is_terminal());
    assert!(BuildStatus::Failed.is_terminal());
    assert!(BuildStatus::Cancelled.is_terminal());
    assert!(!BuildStatus::Queued.is_terminal());
    assert!(!BuildStatus::Preparing.is_terminal());
    assert!(!BuildStatus::Building.is_terminal());
}

#[test]
fn health_any_unhealthy_wins() {
    let health = derive_workload_health(&[
        ContainerHealth::Healthy,
        ContainerHealth::Unhealthy,
        ContainerHealth::Starting,
    ]);
    assert_eq!(health, WorkloadHealth::Unhealthy);
}

#[test]
fn health_starting_beats_healthy() {
    let health = derive_workload_health(&[ContainerHealth::Healthy, ContainerHealth::Starting]);
    assert_eq!(health, WorkloadHealth::Starting);
}

#[test]
fn health_all_healthy() {
    let health = derive_workload_health(&[ContainerHealth::Healthy, ContainerHealth::Healthy]);
    assert_eq!(health, WorkloadHealth::Healthy);
}

#[test]
fn health_empty_without_probes() {
    assert_eq!(derive_workload_health(&[ContainerHealth::None]), WorkloadHealth::None);
    assert_eq!(derive_workload_health(&[]), WorkloadHealth::None);
    assert_eq!(WorkloadHealth::None.as_str(), "");
}

#[test]
fn health_mixed_probe_and_none_is_healthy() {
    let health = derive_workload_health(&[ContainerHealth::Healthy, ContainerHealth::None]);
    assert_eq!(health, WorkloadHealth::Healthy);
}

#[test]
fn status_serde_snake_case() {
    assert_eq!(serde_json::to_string(&LifecycleStatus::Running).unwrap(), "\"running\"");
    assert_eq!(serde_json::to_string(&LocationStatus::Removed).unwrap(), "\"removed\"");
    let status: BuildStatus = serde_json::from_str("\"cancelled\"").unwrap();
    assert_eq!(status, BuildStatus::Cancelled);
}
