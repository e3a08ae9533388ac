// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunked upload sessions.
//!
//! Large files arrive as out-of-order fragments keyed by
//! `(owner, file_name)`; the manager reassembles them and evicts sessions
//! that go idle.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use sv_core::{Clock, Status};
use sv_wire::ChunkedUploadPayload;

/// Sweep period for the eviction task.
pub const SWEEP_PERIOD: Duration = Duration::from_secs(300);

/// Sessions idle longer than this are evicted.
pub fn session_ttl() -> chrono::Duration {
    chrono::Duration::minutes(30)
}

struct ChunkSession {
    file_size: u64,
    total_chunks: u32,
    destination_path: String,
    volume_name: Option<String>,
    file_mode: Option<u32>,
    chunks: BTreeMap<u32, Vec<u8>>,
    bytes_received: u64,
    last_activity: DateTime<Utc>,
    /// Spill file for very large assemblies; deleted on eviction.
    temp_file: Option<PathBuf>,
}

/// Client-facing snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSessionInfo {
    pub file_name: String,
    pub file_size: u64,
    pub total_chunks: u32,
    pub chunks_received: u32,
    pub bytes_received: u64,
    pub destination_path: String,
    pub volume_name: Option<String>,
    pub file_mode: Option<u32>,
}

type SessionKey = (String, String);

#[derive(Clone)]
pub struct ChunkManager {
    sessions: Arc<Mutex<HashMap<SessionKey, ChunkSession>>>,
    clock: Arc<dyn Clock>,
}

impl ChunkManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { sessions: Arc::new(Mutex::new(HashMap::new())), clock }
    }

    fn validate(payload: &ChunkedUploadPayload) -> Result<(), Status> {
        if payload.file_name.trim().is_empty() {
            return Err(Status::invalid_argument("file_name is empty"));
        }
        if payload.file_size == 0 {
            return Err(Status::invalid_argument("file_size must be > 0"));
        }
        if payload.total_chunks == 0 {
            return Err(Status::invalid_argument("total_chunks must be > 0"));
        }
        if payload.chunk_index >= payload.total_chunks {
            return Err(Status::invalid_argument(format!(
                "chunk_index {} outside [0, {})",
                payload.chunk_index, payload.total_chunks
            )));
        }
        if payload.chunk_data.is_empty() {
            return Err(Status::invalid_argument("chunk_data is empty"));
        }
        Ok(())
    }

    /// Store one chunk, creating the session on first contact.
    ///
    /// Idempotent per index: re-receiving a chunk changes nothing and
    /// reports the same accumulated byte count.
    pub fn store_chunk(
        &self,
        owner: &str,
        payload: &ChunkedUploadPayload,
    ) -> Result<ChunkSessionInfo, Status> {
        Self::validate(payload)?;
        let now = self.clock.now();
        let key = (owner.to_string(), payload.file_name.clone());
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(key).or_insert_with(|| ChunkSession {
            file_size: payload.file_size,
            total_chunks: payload.total_chunks,
            destination_path: payload.destination_path.clone(),
            volume_name: payload.volume_name.clone(),
            file_mode: payload.file_mode,
            chunks: BTreeMap::new(),
            bytes_received: 0,
            last_activity: now,
            temp_file: None,
        });

        session.last_activity = now;
        if !session.chunks.contains_key(&payload.chunk_index) {
            session.bytes_received += payload.chunk_data.len() as u64;
            session.chunks.insert(payload.chunk_index, payload.chunk_data.clone());
        }

        Ok(ChunkSessionInfo {
            file_name: payload.file_name.clone(),
            file_size: session.file_size,
            total_chunks: session.total_chunks,
            chunks_received: session.chunks.len() as u32,
            bytes_received: session.bytes_received,
            destination_path: session.destination_path.clone(),
            volume_name: session.volume_name.clone(),
            file_mode: session.file_mode,
        })
    }

    pub fn get(&self, owner: &str, file_name: &str) -> Option<ChunkSessionInfo> {
        let sessions = self.sessions.lock();
        let session = sessions.get(&(owner.to_string(), file_name.to_string()))?;
        Some(ChunkSessionInfo {
            file_name: file_name.to_string(),
            file_size: session.file_size,
            total_chunks: session.total_chunks,
            chunks_received: session.chunks.len() as u32,
            bytes_received: session.bytes_received,
            destination_path: session.destination_path.clone(),
            volume_name: session.volume_name.clone(),
            file_mode: session.file_mode,
        })
    }

    pub fn is_complete(&self, owner: &str, file_name: &str, total_chunks: u32) -> bool {
        self.sessions
            .lock()
            .get(&(owner.to_string(), file_name.to_string()))
            .map(|s| s.chunks.len() as u32 == total_chunks)
            .unwrap_or(false)
    }

    /// Concatenate all chunks ordered by index.
    ///
    /// Fails when chunks are missing or the assembled size differs from
    /// the declared `file_size`. The session survives a failed assembly so
    /// the client can re-send.
    pub fn assemble(
        &self,
        owner: &str,
        file_name: &str,
        total_chunks: u32,
    ) -> Result<Vec<u8>, Status> {
        let sessions = self.sessions.lock();
        let session = sessions
            .get(&(owner.to_string(), file_name.to_string()))
            .ok_or_else(|| Status::not_found(format!("no upload session for {file_name}")))?;
        if session.chunks.len() as u32 != total_chunks {
            return Err(Status::failed_precondition(format!(
                "upload incomplete: {}/{} chunks",
                session.chunks.len(),
                total_chunks
            )));
        }
        let mut assembled = Vec::with_capacity(session.file_size as usize);
        for bytes in session.chunks.values() {
            assembled.extend_from_slice(bytes);
        }
        if assembled.len() as u64 != session.file_size {
            return Err(Status::invalid_argument(format!(
                "size mismatch: assembled {} bytes, declared {}",
                assembled.len(),
                session.file_size
            )));
        }
        Ok(assembled)
    }

    pub fn remove(&self, owner: &str, file_name: &str) {
        if let Some(session) =
            self.sessions.lock().remove(&(owner.to_string(), file_name.to_string()))
        {
            delete_temp(&session);
        }
    }

    /// Evict sessions idle past the TTL. Returns how many were evicted.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        let ttl = session_ttl();
        sessions.retain(|(owner, file), session| {
            let keep = now - session.last_activity <= ttl;
            if !keep {
                debug!(owner = %owner, file = %file, "evicting idle upload session");
                delete_temp(session);
            }
            keep
        });
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Background eviction task.
    pub fn spawn_sweeper(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_PERIOD);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = manager.sweep();
                        if evicted > 0 {
                            debug!(evicted, "chunk session sweep");
                        }
                    }
                }
            }
        })
    }
}

fn delete_temp(session: &ChunkSession) {
    if let Some(path) = &session.temp_file {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to delete upload spill file");
            }
        }
    }
}

#[cfg(test)]
#[path = "chunks_tests.rs"]
mod tests;
