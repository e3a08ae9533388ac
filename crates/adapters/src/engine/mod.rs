// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container engine facade.
//!
//! [`ContainerEngine`] is the only surface the rest of the control plane
//! touches; [`DockerEngine`] implements it over the Docker Engine API.
//! The facade owns the engine-protocol quirks: stdio header framing vs.
//! TTY raw mode, and restart-state error classification.

pub mod docker;
pub mod framing;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sv_core::{ContainerHealth, ContainerId, LocationStatus, Status, StreamKind};

pub use docker::DockerEngine;

/// Label the control plane stamps on every container it creates.
pub const WORKLOAD_LABEL: &str = "stevedore.workload_id";
/// Label naming the compose child service, when applicable.
pub const SERVICE_LABEL: &str = "stevedore.service_name";
/// Compose-standard service label also honored on discovery.
pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Container reported `restarting`; retryable by the caller.
    #[error("container is restarting")]
    Transient,
    #[error("engine error: {0}")]
    Api(String),
}

impl From<EngineError> for Status {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(msg) => Status::not_found(msg),
            EngineError::Transient => Status::failed_precondition("container is restarting"),
            EngineError::Unavailable(msg) | EngineError::Api(msg) => Status::internal(msg),
        }
    }
}

/// Inspect result, reduced to what the control plane consumes.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub running: bool,
    pub restarting: bool,
    pub exit_code: Option<i64>,
    pub status: LocationStatus,
    pub health: ContainerHealth,
    pub image: Option<String>,
    pub tty: bool,
    pub name: Option<String>,
    pub labels: HashMap<String, String>,
    pub mounts: Vec<MountInfo>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            running: false,
            restarting: false,
            exit_code: None,
            status: LocationStatus::Unknown,
            health: ContainerHealth::None,
            image: None,
            tty: false,
            name: None,
            labels: HashMap::new(),
            mounts: Vec::new(),
        }
    }
}

/// One mount of a container.
#[derive(Debug, Clone)]
pub struct MountInfo {
    pub name: Option<String>,
    pub mount_point: String,
    pub source_host_path: Option<String>,
    /// Named volume vs. anonymous/bind.
    pub is_named: bool,
}

/// Creation spec for a single container.
#[derive(Debug, Clone, Default)]
pub struct CreateContainerSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<String>,
    pub labels: HashMap<String, String>,
    pub container_port: Option<u16>,
    pub host_port: Option<u16>,
    pub memory_bytes: Option<u64>,
    pub cpu_shares: Option<u32>,
    pub cmd: Option<Vec<String>>,
    pub tty: bool,
    pub open_stdin: bool,
    pub binds: Vec<String>,
}

/// Captured output of a one-shot exec.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ExecOutput {
    pub fn stdout_utf8(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_utf8(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Log request parameters.
#[derive(Debug, Clone, Default)]
pub struct LogsRequest {
    pub follow: bool,
    pub tail: Option<u32>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// One demultiplexed chunk of container stdio.
#[derive(Debug, Clone)]
pub struct AttachChunk {
    pub stream: StreamKind,
    pub bytes: Vec<u8>,
}

/// A live attach session: demultiplexed output, stdin writer, teardown.
pub struct AttachStreams {
    pub output: mpsc::Receiver<Result<AttachChunk, EngineError>>,
    pub input: mpsc::Sender<Vec<u8>>,
    /// Cancel to tear both directions down.
    pub cancel: CancellationToken,
    /// Whether the container runs with a TTY (raw byte stream, no framing).
    pub tty: bool,
}

/// Engine event, filtered and reduced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEventKind {
    Container,
    Image,
}

#[derive(Debug, Clone)]
pub struct EngineEvent {
    pub kind: EngineEventKind,
    pub action: String,
    pub actor_id: String,
    pub actor_name: Option<String>,
    pub labels: HashMap<String, String>,
    pub at: DateTime<Utc>,
}

/// Resource usage read from engine stats.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSample {
    pub cpu_usage: f64,
    pub memory_bytes: u64,
    pub net_rx_bytes: u64,
    pub net_tx_bytes: u64,
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
}

/// Typed wrapper over engine operations.
///
/// Every method classifies failures as [`EngineError::Unavailable`] on
/// transport failure, [`EngineError::NotFound`] when the target does not
/// exist, and [`EngineError::Transient`] when the container is restarting.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn inspect(&self, container: &ContainerId) -> Result<EngineState, EngineError>;

    /// Containers labeled with `stevedore.workload_id=<id>`.
    async fn list_by_label(
        &self,
        label: &str,
        value: &str,
    ) -> Result<Vec<(ContainerId, EngineState)>, EngineError>;

    async fn create(&self, spec: &CreateContainerSpec) -> Result<ContainerId, EngineError>;

    async fn start(&self, container: &ContainerId) -> Result<(), EngineError>;

    /// Stop with a grace timeout in seconds.
    async fn stop(&self, container: &ContainerId, grace_secs: u32) -> Result<(), EngineError>;

    async fn restart(&self, container: &ContainerId, grace_secs: u32) -> Result<(), EngineError>;

    async fn remove(&self, container: &ContainerId, force: bool) -> Result<(), EngineError>;

    /// Attach to container stdio. Output is demultiplexed; TTY containers
    /// deliver raw bytes on stdout.
    async fn attach(&self, container: &ContainerId) -> Result<AttachStreams, EngineError>;

    async fn exec(&self, container: &ContainerId, argv: &[String]) -> Result<ExecOutput, EngineError>;

    /// Container logs as demultiplexed chunks; `follow` keeps the stream
    /// open.
    async fn logs(
        &self,
        container: &ContainerId,
        request: &LogsRequest,
    ) -> Result<mpsc::Receiver<Result<AttachChunk, EngineError>>, EngineError>;

    /// Engine event stream filtered by type (container|image) and label.
    async fn events(
        &self,
        label: Option<(String, String)>,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<Result<EngineEvent, EngineError>>, EngineError>;

    /// Upload a tar stream into `dest_path` inside the container.
    async fn copy_to(
        &self,
        container: &ContainerId,
        dest_path: &str,
        tar_bytes: Vec<u8>,
    ) -> Result<(), EngineError>;

    /// Download `path` from the container as a tar archive.
    async fn copy_from(&self, container: &ContainerId, path: &str) -> Result<Vec<u8>, EngineError>;

    async fn resize(&self, container: &ContainerId, rows: u16, cols: u16) -> Result<(), EngineError>;

    /// One stats read (no streaming); the metrics poller calls this.
    async fn stats_once(&self, container: &ContainerId) -> Result<StatsSample, EngineError>;

    /// Volumes mounted by the container.
    async fn container_volumes(&self, container: &ContainerId) -> Result<Vec<MountInfo>, EngineError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
