// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build-log streaming: per-workload ring buffer plus live fan-out.
//!
//! Subscribers get a snapshot of the ring at subscribe time, then live
//! delivery on a bounded queue. A subscriber that falls behind the bound
//! is dropped; the writer never blocks.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use sv_core::{BuildId, Clock, LogLine, StreamKind, WorkloadId};
use sv_storage::BuildLogsRepository;

/// Ring capacity per workload.
const RING_CAPACITY: usize = 10_000;
/// Per-subscriber live queue bound.
const SUBSCRIBER_BUFFER: usize = 256;

struct Ring {
    lines: VecDeque<LogLine>,
    next_seq: u64,
    subscribers: Vec<mpsc::Sender<LogLine>>,
    current_build: Option<BuildId>,
}

impl Ring {
    fn new() -> Self {
        Self {
            lines: VecDeque::new(),
            next_seq: 0,
            subscribers: Vec::new(),
            current_build: None,
        }
    }
}

#[derive(Clone)]
pub struct BuildLogHub {
    rings: Arc<Mutex<HashMap<WorkloadId, Ring>>>,
    repo: Arc<dyn BuildLogsRepository>,
    clock: Arc<dyn Clock>,
}

impl BuildLogHub {
    pub fn new(repo: Arc<dyn BuildLogsRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { rings: Arc::new(Mutex::new(HashMap::new())), repo, clock }
    }

    /// Start a new build: reset the ring and aim persistence at `build`.
    pub fn begin_build(&self, workload: &WorkloadId, build: &BuildId) {
        let mut rings = self.rings.lock();
        let ring = rings.entry(workload.clone()).or_insert_with(Ring::new);
        ring.lines.clear();
        ring.next_seq = 0;
        ring.current_build = Some(build.clone());
    }

    /// Detach persistence; the ring stays for late subscribers.
    pub fn end_build(&self, workload: &WorkloadId) {
        if let Some(ring) = self.rings.lock().get_mut(workload.as_str()) {
            ring.current_build = None;
        }
    }

    /// Append one line and fan it out. Synchronous under the ring mutex;
    /// persistence detaches onto its own task.
    pub fn write(&self, workload: &WorkloadId, stream: StreamKind, text: &str) {
        let mut rings = self.rings.lock();
        let ring = rings.entry(workload.clone()).or_insert_with(Ring::new);
        let line = LogLine {
            seq: ring.next_seq,
            at: self.clock.now(),
            stream,
            line: text.to_string(),
        };
        ring.next_seq += 1;
        ring.lines.push_back(line.clone());
        if ring.lines.len() > RING_CAPACITY {
            ring.lines.pop_front();
        }
        // Drop-on-slow: a full queue costs the subscriber its slot.
        ring.subscribers.retain(|tx| match tx.try_send(line.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(%workload, "dropping slow build-log subscriber");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });

        if let Some(build) = ring.current_build.clone() {
            let repo = Arc::clone(&self.repo);
            tokio::spawn(async move {
                if let Err(e) = repo.append(&build, &line).await {
                    warn!(%build, error = %e, "failed to persist build log line");
                }
            });
        }
    }

    /// Stderr-classified sibling writer.
    pub fn write_stderr(&self, workload: &WorkloadId, text: &str) {
        self.write(workload, StreamKind::Stderr, text);
    }

    /// Snapshot-then-live subscription.
    ///
    /// The snapshot is the full ring at subscribe time; the receiver then
    /// carries every newer line until the subscriber lags out.
    pub fn subscribe(&self, workload: &WorkloadId) -> (Vec<LogLine>, mpsc::Receiver<LogLine>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut rings = self.rings.lock();
        let ring = rings.entry(workload.clone()).or_insert_with(Ring::new);
        let snapshot: Vec<LogLine> = ring.lines.iter().cloned().collect();
        ring.subscribers.push(tx);
        (snapshot, rx)
    }

    /// Whether the in-memory ring holds anything for the workload.
    pub fn has_buffered(&self, workload: &WorkloadId) -> bool {
        self.rings
            .lock()
            .get(workload.as_str())
            .map(|r| !r.lines.is_empty())
            .unwrap_or(false)
    }

    /// Replay from the time-series store, for reconnects that arrive after
    /// the process restarted mid-build.
    pub async fn replay_from_store(&self, build: &BuildId) -> Vec<LogLine> {
        match self.repo.get_build_logs(build).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(%build, error = %e, "build log replay from store failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
#[path = "buildlog_tests.rs"]
mod tests;
