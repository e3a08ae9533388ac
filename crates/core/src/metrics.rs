// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live resource metric samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which workload class a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Deployment,
    Gameserver,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::Gameserver => "gameserver",
        }
    }
}

/// One resource usage sample for one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub container_id: String,
    pub at: DateTime<Utc>,
    /// Fraction of one core, not a percentage.
    pub cpu_usage: f64,
    pub memory_bytes: u64,
    pub net_rx_bytes: u64,
    pub net_tx_bytes: u64,
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
}

impl MetricSample {
    /// All-zero keep-alive sample used by the heartbeat watchdog.
    pub fn zero(resource_type: ResourceType, resource_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
            container_id: String::new(),
            at,
            cpu_usage: 0.0,
            memory_bytes: 0,
            net_rx_bytes: 0,
            net_tx_bytes: 0,
            disk_read_bytes: 0,
            disk_write_bytes: 0,
        }
    }
}

/// Collapse per-container samples into per-instant aggregates.
///
/// Selection is by instant equality, not container identity: memory, net
/// and disk sum; cpu averages across the samples sharing the instant.
/// Output order follows first appearance of each instant.
pub fn aggregate_samples(samples: &[MetricSample]) -> Vec<MetricSample> {
    let mut out: Vec<MetricSample> = Vec::new();
    let mut counts: Vec<u32> = Vec::new();

    for s in samples {
        match out.iter_mut().zip(counts.iter_mut()).find(|(agg, _)| agg.at == s.at) {
            Some((agg, count)) => {
                agg.cpu_usage += s.cpu_usage;
                agg.memory_bytes += s.memory_bytes;
                agg.net_rx_bytes += s.net_rx_bytes;
                agg.net_tx_bytes += s.net_tx_bytes;
                agg.disk_read_bytes += s.disk_read_bytes;
                agg.disk_write_bytes += s.disk_write_bytes;
                *count += 1;
            }
            None => {
                let mut agg = s.clone();
                agg.container_id = String::new();
                out.push(agg);
                counts.push(1);
            }
        }
    }

    for (agg, count) in out.iter_mut().zip(counts.iter()) {
        agg.cpu_usage /= f64::from(*count);
    }
    out
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
