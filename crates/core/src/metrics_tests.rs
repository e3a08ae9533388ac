// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn sample(container: &str, at_secs: i64, cpu: f64, mem: u64) -> MetricSample {
    MetricSample {
        resource_type: ResourceType::Deployment,
        resource_id: "deploy-1".into(),
        container_id: container.into(),
        at: Utc.timestamp_opt(at_secs, 0).single().unwrap(),
        cpu_usage: cpu,
        memory_bytes: mem,
        net_rx_bytes: 10,
        net_tx_bytes: 20,
        disk_read_bytes: 30,
        disk_write_bytes: 40,
    }
}

#[test]
fn aggregates_by_instant_not_container() {
    let samples = vec![sample("a", 100, 0.2, 100), sample("b", 100, 0.4, 300)];
    let agg = aggregate_samples(&samples);
    assert_eq!(agg.len(), 1);
    assert!((agg[0].cpu_usage - 0.3).abs() < 1e-9);
    assert_eq!(agg[0].memory_bytes, 400);
    assert_eq!(agg[0].net_rx_bytes, 20);
    assert_eq!(agg[0].disk_write_bytes, 80);
    assert!(agg[0].container_id.is_empty());
}

#[test]
fn distinct_instants_stay_separate_in_order() {
    let samples = vec![sample("a", 200, 0.5, 50), sample("a", 100, 0.1, 10)];
    let agg = aggregate_samples(&samples);
    assert_eq!(agg.len(), 2);
    assert_eq!(agg[0].at.timestamp(), 200);
    assert_eq!(agg[1].at.timestamp(), 100);
}

#[test]
fn single_sample_passes_through() {
    let agg = aggregate_samples(&[sample("a", 100, 0.7, 77)]);
    assert_eq!(agg.len(), 1);
    assert!((agg[0].cpu_usage - 0.7).abs() < 1e-9);
    assert_eq!(agg[0].memory_bytes, 77);
}

#[test]
fn empty_input_empty_output() {
    assert!(aggregate_samples(&[]).is_empty());
}

#[test]
fn zero_sample_shape() {
    let at = Utc.timestamp_opt(5, 0).single().unwrap();
    let z = MetricSample::zero(ResourceType::Gameserver, "gs-1", at);
    assert_eq!(z.cpu_usage, 0.0);
    assert_eq!(z.memory_bytes, 0);
    assert_eq!(z.resource_id, "gs-1");
}
