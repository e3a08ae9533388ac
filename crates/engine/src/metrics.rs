// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live metrics streaming: per-resource subscriber sets fed by a poller
//! that reads engine stats.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use sv_adapters::ContainerEngine;
use sv_core::{Clock, MetricSample, ResourceType, WorkloadId};
use sv_storage::{LocationRepository, MetricsRepository};

/// Samples kept per subject for late subscribers.
const HISTORY: usize = 5;
/// Per-subscriber queue bound; producers never block.
const SUBSCRIBER_BUFFER: usize = 64;
/// Poll period for engine stats.
pub const POLL_PERIOD: Duration = Duration::from_secs(30);
/// Watchdog threshold: two missed poll periods.
pub const HEARTBEAT_AFTER: Duration = Duration::from_secs(60);

struct Subject {
    history: VecDeque<MetricSample>,
    subscribers: HashMap<u64, mpsc::Sender<MetricSample>>,
}

impl Subject {
    fn new() -> Self {
        Self { history: VecDeque::new(), subscribers: HashMap::new() }
    }
}

/// One live subscription; drop it (or call
/// [`MetricsStreamer::unsubscribe`]) on teardown.
pub struct Subscription {
    pub id: u64,
    pub rx: mpsc::Receiver<MetricSample>,
}

/// Process-wide metrics fan-out.
#[derive(Clone)]
pub struct MetricsStreamer {
    subjects: Arc<RwLock<HashMap<String, Subject>>>,
    next_id: Arc<parking_lot::Mutex<u64>>,
}

impl Default for MetricsStreamer {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsStreamer {
    pub fn new() -> Self {
        Self {
            subjects: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(parking_lot::Mutex::new(0)),
        }
    }

    /// Deliver a sample to every subscriber of its resource id.
    pub fn publish(&self, sample: MetricSample) {
        let mut subjects = self.subjects.write();
        let subject = subjects.entry(sample.resource_id.clone()).or_insert_with(Subject::new);
        subject.history.push_back(sample.clone());
        if subject.history.len() > HISTORY {
            subject.history.pop_front();
        }
        subject.subscribers.retain(|id, tx| match tx.try_send(sample.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(resource = %sample.resource_id, subscriber = id,
                    "dropping slow metrics subscriber");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Subscribe to a resource; recent history is not replayed, the
    /// subject's poller delivers fresh samples.
    pub fn subscribe(&self, resource_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            *next
        };
        self.subjects
            .write()
            .entry(resource_id.to_string())
            .or_insert_with(Subject::new)
            .subscribers
            .insert(id, tx);
        Subscription { id, rx }
    }

    pub fn unsubscribe(&self, resource_id: &str, id: u64) {
        let mut subjects = self.subjects.write();
        if let Some(subject) = subjects.get_mut(resource_id) {
            subject.subscribers.remove(&id);
            if subject.subscribers.is_empty() {
                subjects.remove(resource_id);
            }
        }
    }

    pub fn subscriber_count(&self, resource_id: &str) -> usize {
        self.subjects.read().get(resource_id).map(|s| s.subscribers.len()).unwrap_or(0)
    }

    /// Recent samples for a subject (history window).
    pub fn recent(&self, resource_id: &str) -> Vec<MetricSample> {
        self.subjects
            .read()
            .get(resource_id)
            .map(|s| s.history.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Spawn the stats poller for one workload.
///
/// Polls engine stats for every running location and publishes one sample
/// per container per tick; samples also land in the metrics repository.
/// The task exits when the last subscriber goes away or on cancel.
#[allow(clippy::too_many_arguments)]
pub fn spawn_poller(
    streamer: MetricsStreamer,
    engine: Arc<dyn ContainerEngine>,
    locations: Arc<dyn LocationRepository>,
    metrics_repo: Arc<dyn MetricsRepository>,
    clock: Arc<dyn Clock>,
    workload: WorkloadId,
    resource_type: ResourceType,
    period: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if streamer.subscriber_count(workload.as_str()) == 0 {
                debug!(%workload, "metrics poller stopping; no subscribers");
                break;
            }
            let rows = match locations.get_all(&workload).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(%workload, error = %e, "metrics poller: location read failed");
                    continue;
                }
            };
            let at = clock.now();
            for row in rows.iter().filter(|r| r.is_running()) {
                match engine.stats_once(&row.container_id).await {
                    Ok(stats) => {
                        let sample = MetricSample {
                            resource_type,
                            resource_id: workload.to_string(),
                            container_id: row.container_id.to_string(),
                            at,
                            cpu_usage: stats.cpu_usage,
                            memory_bytes: stats.memory_bytes,
                            net_rx_bytes: stats.net_rx_bytes,
                            net_tx_bytes: stats.net_tx_bytes,
                            disk_read_bytes: stats.disk_read_bytes,
                            disk_write_bytes: stats.disk_write_bytes,
                        };
                        if let Err(e) = metrics_repo.record(&sample).await {
                            warn!(%workload, error = %e, "metrics history write failed");
                        }
                        streamer.publish(sample);
                    }
                    Err(e) => {
                        debug!(%workload, container = %row.container_id.short(12),
                            error = %e, "stats read failed");
                    }
                }
            }
        }
    })
}

/// Receive the next sample with the heartbeat watchdog applied.
///
/// After [`HEARTBEAT_AFTER`] of silence a warning is logged; game-server
/// subscriptions get an all-zero keep-alive sample, deployment
/// subscriptions keep waiting (silence is legitimate there). `None` means
/// the subscription ended.
pub async fn recv_with_heartbeat(
    subscription: &mut Subscription,
    resource_type: ResourceType,
    resource_id: &str,
    clock: &Arc<dyn Clock>,
) -> Option<MetricSample> {
    loop {
        match tokio::time::timeout(HEARTBEAT_AFTER, subscription.rx.recv()).await {
            Ok(sample) => return sample,
            Err(_elapsed) => {
                warn!(resource = %resource_id, "no metric sample for {}s",
                    HEARTBEAT_AFTER.as_secs());
                if resource_type == ResourceType::Gameserver {
                    return Some(MetricSample::zero(resource_type, resource_id, clock.now()));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
