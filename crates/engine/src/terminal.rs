// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal sessions: one shared attach per workload.
//!
//! Every WebSocket for the same workload shares the single attach, so
//! multiple browser tabs see the same stdio. The session closes when the
//! last client detaches or the attach reader hits EOF.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use sv_adapters::engine::{AttachStreams, ContainerEngine};
use sv_core::{Clock, ContainerId, Status, WorkloadId};

/// Broadcast depth for shared output.
const OUTPUT_BUFFER: usize = 256;

/// One attached stdio session.
pub struct TerminalSession {
    pub workload_id: WorkloadId,
    pub container_id: ContainerId,
    pub created_at: DateTime<Utc>,
    pub tty: bool,
    input: mpsc::Sender<Vec<u8>>,
    output: broadcast::Sender<Vec<u8>>,
    cancel: CancellationToken,
    clients: AtomicUsize,
}

impl TerminalSession {
    /// Write client input to container stdin. Writes are serialized by the
    /// input channel.
    pub async fn write(&self, bytes: Vec<u8>) -> Result<(), Status> {
        self.input
            .send(bytes)
            .await
            .map_err(|_| Status::internal("terminal input channel closed"))
    }

    /// Subscribe to the shared output stream.
    pub fn subscribe_output(&self) -> broadcast::Receiver<Vec<u8>> {
        self.output.subscribe()
    }

    pub fn client_connected(&self) -> usize {
        self.clients.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the remaining client count; at zero the caller should close
    /// the session.
    pub fn client_disconnected(&self) -> usize {
        self.clients.fetch_sub(1, Ordering::SeqCst).saturating_sub(1)
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// Process-local session map, keyed by workload.
#[derive(Clone, Default)]
pub struct TerminalSessions {
    sessions: Arc<Mutex<HashMap<WorkloadId, Arc<TerminalSession>>>>,
}

impl TerminalSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to the container, or join the existing session for the
    /// workload if one is still open.
    pub async fn get_or_attach(
        &self,
        engine: &Arc<dyn ContainerEngine>,
        clock: &Arc<dyn Clock>,
        workload: &WorkloadId,
        container: &ContainerId,
    ) -> Result<Arc<TerminalSession>, Status> {
        if let Some(existing) = self.sessions.lock().get(workload.as_str()) {
            if !existing.is_closed() {
                debug!(%workload, "joining existing terminal session");
                return Ok(Arc::clone(existing));
            }
        }

        let AttachStreams { mut output, input, cancel, tty } = engine.attach(container).await?;
        let (out_tx, _) = broadcast::channel(OUTPUT_BUFFER);

        let session = Arc::new(TerminalSession {
            workload_id: workload.clone(),
            container_id: container.clone(),
            created_at: clock.now(),
            tty,
            input,
            output: out_tx.clone(),
            cancel: cancel.clone(),
            clients: AtomicUsize::new(0),
        });

        // Single reader task per session pumps attach output into the
        // broadcast; EOF closes the session for every client.
        let sessions = self.clone();
        let session_workload = workload.clone();
        let pump_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = pump_cancel.cancelled() => break,
                    chunk = output.recv() => match chunk {
                        Some(Ok(chunk)) => {
                            let _ = out_tx.send(chunk.bytes);
                        }
                        Some(Err(e)) => {
                            debug!(workload = %session_workload, error = %e, "attach read error");
                            break;
                        }
                        None => {
                            info!(workload = %session_workload, "attach reader EOF");
                            break;
                        }
                    },
                }
            }
            pump_cancel.cancel();
            sessions.sessions.lock().remove(session_workload.as_str());
        });

        self.sessions.lock().insert(workload.clone(), Arc::clone(&session));
        Ok(session)
    }

    pub fn get(&self, workload: &WorkloadId) -> Option<Arc<TerminalSession>> {
        self.sessions.lock().get(workload.as_str()).cloned()
    }

    /// Drop and cancel the session for a workload.
    pub fn close(&self, workload: &WorkloadId) {
        if let Some(session) = self.sessions.lock().remove(workload.as_str()) {
            session.close();
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

/// What the stopped-mode gate wants the handler to do with one input
/// burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateAction {
    /// Echo these bytes back to the client.
    Echo(Vec<u8>),
    /// The user committed the `start` command.
    Start,
    /// The user committed something else; show "unknown command".
    Unknown(String),
}

/// Stopped-mode input accumulator.
///
/// Characters that keep the accumulated word a prefix of `start`
/// (case-insensitive) are echoed; once the input diverges, echoing stops
/// until the next newline resets the buffer.
#[derive(Debug, Default)]
pub struct StartGate {
    buffer: String,
    echoing_suppressed: bool,
}

const START_WORD: &str = "start";

impl StartGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw client bytes; returns the actions in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<GateAction> {
        let mut actions = Vec::new();
        for &b in bytes {
            match b {
                b'\r' | b'\n' => {
                    let word = std::mem::take(&mut self.buffer);
                    self.echoing_suppressed = false;
                    if word.eq_ignore_ascii_case(START_WORD) {
                        actions.push(GateAction::Start);
                    } else if !word.is_empty() {
                        actions.push(GateAction::Unknown(word));
                    }
                }
                // Backspace/delete trims the buffer and re-enables echo
                // when the remaining prefix matches again.
                0x08 | 0x7f => {
                    self.buffer.pop();
                    self.echoing_suppressed = !is_start_prefix(&self.buffer);
                    actions.push(GateAction::Echo(vec![0x08, b' ', 0x08]));
                }
                _ => {
                    let c = b as char;
                    self.buffer.push(c.to_ascii_lowercase());
                    if is_start_prefix(&self.buffer) && !self.echoing_suppressed {
                        actions.push(GateAction::Echo(vec![b]));
                    } else {
                        self.echoing_suppressed = true;
                    }
                }
            }
        }
        actions
    }
}

fn is_start_prefix(buffer: &str) -> bool {
    START_WORD.starts_with(buffer)
}

#[cfg(test)]
#[path = "terminal_tests.rs"]
mod tests;
