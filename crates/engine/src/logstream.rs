// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merged workload log stream.
//!
//! Container stdio and structured engine events merge onto one bounded
//! channel; every payload is sanitized and level-classified before it
//! leaves the process.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use sv_adapters::engine::{
    ContainerEngine, EngineEvent, EngineEventKind, LogsRequest, WORKLOAD_LABEL,
};
use sv_core::{loglevel, sanitize, Clock, ContainerId, LogLevel, Status, StreamKind, WorkloadId};

/// Merged-channel depth.
const MERGE_BUFFER: usize = 512;

/// One delivered line.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedLine {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub stream: StreamKind,
    pub message: String,
    /// Originating container id, or `engine` for synthetic event lines.
    pub source: String,
}

/// Engine actions rendered as synthetic log lines.
const RENDERED_ACTIONS: &[&str] = &[
    "create", "start", "stop", "die", "kill", "restart", "pause", "unpause", "health_status",
    "pull", "tag", "untag", "delete",
];

/// Render an engine event as `[engine] <verb> container|image <name>`.
///
/// Events whose action is outside the rendered set produce nothing.
pub fn format_engine_event(event: &EngineEvent) -> Option<String> {
    // health_status arrives as "health_status: healthy"; match the prefix.
    let action = event.action.split(':').next().unwrap_or_default().trim();
    if !RENDERED_ACTIONS.contains(&action) {
        return None;
    }
    let noun = match event.kind {
        EngineEventKind::Container => "container",
        EngineEventKind::Image => "image",
    };
    let name = event.actor_name.clone().unwrap_or_else(|| {
        let mut id = event.actor_id.clone();
        id.truncate(12);
        id
    });
    Some(format!("[engine] {} {} {}", event.action, noun, name))
}

/// Whether an event belongs to the workload: labeled directly, or its
/// actor is one of the workload's known containers or images.
pub fn event_matches_workload(
    event: &EngineEvent,
    workload: &WorkloadId,
    container_ids: &[ContainerId],
    images: &[String],
) -> bool {
    if event.labels.get(WORKLOAD_LABEL).map(String::as_str) == Some(workload.as_str()) {
        return true;
    }
    match event.kind {
        EngineEventKind::Container => {
            container_ids.iter().any(|c| c.matches(&event.actor_id))
        }
        EngineEventKind::Image => images.iter().any(|i| i == &event.actor_id),
    }
}

/// Incremental splitter turning byte chunks into whole lines.
///
/// Carries the trailing partial line between feeds; `flush` drains it.
#[derive(Debug, Default)]
pub struct LineSplitter {
    remainder: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.remainder.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.remainder.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.remainder.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.remainder.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.remainder))
        }
    }
}

/// Sanitize and classify one raw line.
pub fn prepare_line(
    raw: &[u8],
    stream: StreamKind,
    source: &str,
    at: DateTime<Utc>,
) -> AggregatedLine {
    let message = sanitize::sanitize_line(raw);
    let level = loglevel::classify(&message, stream);
    AggregatedLine { at, level, stream, message, source: source.to_string() }
}

/// Open the merged log+event stream for one container of a workload.
///
/// `follow` is derived from the container's running state: stopped
/// containers replay the historical buffer and the stream ends.
#[allow(clippy::too_many_arguments)]
pub async fn stream_container_logs(
    engine: Arc<dyn ContainerEngine>,
    clock: Arc<dyn Clock>,
    workload: WorkloadId,
    container: ContainerId,
    known_containers: Vec<ContainerId>,
    known_images: Vec<String>,
    tail: Option<u32>,
    cancel: CancellationToken,
) -> Result<mpsc::Receiver<AggregatedLine>, Status> {
    let state = engine.inspect(&container).await?;
    let follow = state.running;

    let mut log_rx = engine
        .logs(&container, &LogsRequest { follow, tail, ..Default::default() })
        .await?;

    let (tx, rx) = mpsc::channel(MERGE_BUFFER);

    // Container stdio leg.
    let stdio_tx = tx.clone();
    let stdio_clock = Arc::clone(&clock);
    let stdio_source = container.to_string();
    let stdio_cancel = cancel.clone();
    tokio::spawn(async move {
        let mut stdout_lines = LineSplitter::new();
        let mut stderr_lines = LineSplitter::new();
        loop {
            tokio::select! {
                _ = stdio_cancel.cancelled() => break,
                chunk = log_rx.recv() => match chunk {
                    Some(Ok(chunk)) => {
                        let splitter = match chunk.stream {
                            StreamKind::Stdout => &mut stdout_lines,
                            StreamKind::Stderr => &mut stderr_lines,
                        };
                        for line in splitter.feed(&chunk.bytes) {
                            let prepared = prepare_line(
                                &line, chunk.stream, &stdio_source, stdio_clock.now());
                            if stdio_tx.send(prepared).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "log stream error");
                        break;
                    }
                    None => break,
                },
            }
        }
        for (splitter, stream) in
            [(&mut stdout_lines, StreamKind::Stdout), (&mut stderr_lines, StreamKind::Stderr)]
        {
            if let Some(line) = splitter.flush() {
                let _ =
                    stdio_tx.send(prepare_line(&line, stream, &stdio_source, stdio_clock.now())).await;
            }
        }
    });

    // Engine-event leg, only while following; a historical dump has no
    // live events to merge.
    if follow {
        let mut event_rx = engine
            .events(Some((WORKLOAD_LABEL.to_string(), workload.to_string())), cancel.clone())
            .await?;
        let event_tx = tx;
        let event_clock = clock;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = event_rx.recv() => match event {
                        Some(Ok(event)) => {
                            if !event_matches_workload(
                                &event, &workload, &known_containers, &known_images)
                            {
                                continue;
                            }
                            let Some(message) = format_engine_event(&event) else { continue };
                            let line = AggregatedLine {
                                at: event_clock.now(),
                                level: LogLevel::Info,
                                stream: StreamKind::Stdout,
                                message,
                                source: "engine".to_string(),
                            };
                            if event_tx.send(line).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            debug!(error = %e, "event stream error");
                            break;
                        }
                        None => break,
                    },
                }
            }
        });
    }

    Ok(rx)
}

#[cfg(test)]
#[path = "logstream_tests.rs"]
mod tests;
