// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker Engine implementation of the container facade, over bollard.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, Config, CreateContainerOptions, DownloadFromContainerOptions,
    InspectContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, ResizeContainerTtyOptions, RestartContainerOptions,
    StartContainerOptions, Stats, StatsOptions, StopContainerOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{
    ContainerStateStatusEnum, EventMessage, EventMessageTypeEnum, HealthStatusEnum, HostConfig,
    MountPointTypeEnum, PortBinding,
};
use bollard::system::EventsOptions;
use bollard::Docker;
use chrono::{TimeZone, Utc};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use sv_core::{ContainerHealth, ContainerId, LocationStatus, StreamKind};

use super::{
    AttachChunk, AttachStreams, ContainerEngine, CreateContainerSpec, EngineError, EngineEvent,
    EngineEventKind, EngineState, ExecOutput, LogsRequest, MountInfo, StatsSample,
};

/// Buffer depth for output channels; producers drop the stream on overflow
/// rather than block the engine connection.
const CHANNEL_DEPTH: usize = 256;

/// Facade over a local Docker Engine.
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect with the platform defaults (unix socket or npipe).
    pub fn connect() -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

fn map_err(err: bollard::errors::Error) -> EngineError {
    match err {
        bollard::errors::Error::DockerResponseServerError { status_code: 404, message } => {
            EngineError::NotFound(message)
        }
        bollard::errors::Error::DockerResponseServerError { status_code, message } => {
            EngineError::Api(format!("engine returned {status_code}: {message}"))
        }
        other => EngineError::Unavailable(other.to_string()),
    }
}

fn state_from_inspect(resp: &bollard::models::ContainerInspectResponse) -> EngineState {
    let state = resp.state.as_ref();
    let status = match state.and_then(|s| s.status) {
        Some(ContainerStateStatusEnum::CREATED) => LocationStatus::Created,
        Some(ContainerStateStatusEnum::RUNNING) | Some(ContainerStateStatusEnum::PAUSED) => {
            LocationStatus::Running
        }
        Some(ContainerStateStatusEnum::RESTARTING) => LocationStatus::Running,
        Some(ContainerStateStatusEnum::EXITED) | Some(ContainerStateStatusEnum::DEAD) => {
            LocationStatus::Stopped
        }
        Some(ContainerStateStatusEnum::REMOVING) => LocationStatus::Removed,
        _ => LocationStatus::Unknown,
    };
    let health = match state.and_then(|s| s.health.as_ref()).and_then(|h| h.status) {
        Some(HealthStatusEnum::STARTING) => ContainerHealth::Starting,
        Some(HealthStatusEnum::HEALTHY) => ContainerHealth::Healthy,
        Some(HealthStatusEnum::UNHEALTHY) => ContainerHealth::Unhealthy,
        _ => ContainerHealth::None,
    };
    EngineState {
        running: state.and_then(|s| s.running).unwrap_or(false),
        restarting: state.and_then(|s| s.restarting).unwrap_or(false),
        exit_code: state.and_then(|s| s.exit_code),
        status,
        health,
        image: resp.config.as_ref().and_then(|c| c.image.clone()),
        tty: resp.config.as_ref().and_then(|c| c.tty).unwrap_or(false),
        name: resp.name.as_ref().map(|n| n.trim_start_matches('/').to_string()),
        labels: resp.config.as_ref().and_then(|c| c.labels.clone()).unwrap_or_default(),
        mounts: resp.mounts.as_ref().map(|m| m.iter().map(mount_info).collect()).unwrap_or_default(),
    }
}

fn mount_info(mount: &bollard::models::MountPoint) -> MountInfo {
    MountInfo {
        name: mount.name.clone(),
        mount_point: mount.destination.clone().unwrap_or_default(),
        source_host_path: mount.source.clone(),
        is_named: mount.typ == Some(MountPointTypeEnum::VOLUME) && mount.name.is_some(),
    }
}

fn chunk_from_log_output(output: LogOutput) -> AttachChunk {
    match output {
        LogOutput::StdErr { message } => {
            AttachChunk { stream: StreamKind::Stderr, bytes: message.to_vec() }
        }
        // Console is the TTY path: a single raw stream.
        LogOutput::StdOut { message }
        | LogOutput::Console { message }
        | LogOutput::StdIn { message } => {
            AttachChunk { stream: StreamKind::Stdout, bytes: message.to_vec() }
        }
    }
}

fn event_from_message(msg: EventMessage) -> Option<EngineEvent> {
    let kind = match msg.typ {
        Some(EventMessageTypeEnum::CONTAINER) => EngineEventKind::Container,
        Some(EventMessageTypeEnum::IMAGE) => EngineEventKind::Image,
        _ => return None,
    };
    let actor = msg.actor.unwrap_or_default();
    let attributes = actor.attributes.unwrap_or_default();
    let at = msg
        .time_nano
        .map(|n| Utc.timestamp_nanos(n))
        .or_else(|| msg.time.and_then(|t| Utc.timestamp_opt(t, 0).single()))
        .unwrap_or_else(Utc::now);
    Some(EngineEvent {
        kind,
        action: msg.action.unwrap_or_default(),
        actor_id: actor.id.unwrap_or_default(),
        actor_name: attributes.get("name").cloned(),
        labels: attributes,
        at,
    })
}

/// Derive a usage sample from one engine stats read.
pub(crate) fn sample_from_stats(stats: &Stats) -> StatsSample {
    let cpu_delta = stats.cpu_stats.cpu_usage.total_usage as f64
        - stats.precpu_stats.cpu_usage.total_usage as f64;
    let system_delta = stats.cpu_stats.system_cpu_usage.unwrap_or(0) as f64
        - stats.precpu_stats.system_cpu_usage.unwrap_or(0) as f64;
    let online = stats.cpu_stats.online_cpus.unwrap_or(1).max(1) as f64;
    let cpu_usage = if system_delta > 0.0 && cpu_delta >= 0.0 {
        (cpu_delta / system_delta) * online
    } else {
        0.0
    };

    let (net_rx, net_tx) = stats
        .networks
        .as_ref()
        .map(|nets| {
            nets.values().fold((0u64, 0u64), |(rx, tx), n| (rx + n.rx_bytes, tx + n.tx_bytes))
        })
        .unwrap_or((0, 0));

    let (disk_read, disk_write) = stats
        .blkio_stats
        .io_service_bytes_recursive
        .as_ref()
        .map(|entries| {
            entries.iter().fold((0u64, 0u64), |(r, w), e| match e.op.as_str() {
                "read" | "Read" => (r + e.value, w),
                "write" | "Write" => (r, w + e.value),
                _ => (r, w),
            })
        })
        .unwrap_or((0, 0));

    StatsSample {
        cpu_usage,
        memory_bytes: stats.memory_stats.usage.unwrap_or(0),
        net_rx_bytes: net_rx,
        net_tx_bytes: net_tx,
        disk_read_bytes: disk_read,
        disk_write_bytes: disk_write,
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn inspect(&self, container: &ContainerId) -> Result<EngineState, EngineError> {
        let resp = self
            .docker
            .inspect_container(container.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_err)?;
        let state = state_from_inspect(&resp);
        if state.restarting {
            return Err(EngineError::Transient);
        }
        Ok(state)
    }

    async fn list_by_label(
        &self,
        label: &str,
        value: &str,
    ) -> Result<Vec<(ContainerId, EngineState)>, EngineError> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{label}={value}")]);
        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(map_err)?;

        let mut out = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(id) = summary.id else { continue };
            let container = ContainerId::new(id);
            // Inspect individually; the summary lacks health and mounts.
            match self
                .docker
                .inspect_container(container.as_str(), None::<InspectContainerOptions>)
                .await
            {
                Ok(resp) => out.push((container, state_from_inspect(&resp))),
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => continue,
                Err(e) => return Err(map_err(e)),
            }
        }
        Ok(out)
    }

    async fn create(&self, spec: &CreateContainerSpec) -> Result<ContainerId, EngineError> {
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        if let Some(container_port) = spec.container_port {
            let key = format!("{container_port}/tcp");
            exposed_ports.insert(key.clone(), HashMap::new());
            port_bindings.insert(
                key,
                Some(vec![PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: spec.host_port.map(|p| p.to_string()),
                }]),
            );
        }

        let host_config = HostConfig {
            memory: spec.memory_bytes.map(|m| m as i64),
            cpu_shares: spec.cpu_shares.map(i64::from),
            port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
            binds: (!spec.binds.is_empty()).then(|| spec.binds.clone()),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            env: (!spec.env.is_empty()).then(|| spec.env.clone()),
            labels: Some(spec.labels.clone()),
            cmd: spec.cmd.clone(),
            tty: Some(spec.tty),
            open_stdin: Some(spec.open_stdin),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions { name: spec.name.clone(), platform: None }),
                config,
            )
            .await
            .map_err(map_err)?;
        debug!(container_id = %created.id, name = %spec.name, "created container");
        Ok(ContainerId::new(created.id))
    }

    async fn start(&self, container: &ContainerId) -> Result<(), EngineError> {
        self.docker
            .start_container(container.as_str(), None::<StartContainerOptions<String>>)
            .await
            .map_err(map_err)
    }

    async fn stop(&self, container: &ContainerId, grace_secs: u32) -> Result<(), EngineError> {
        self.docker
            .stop_container(container.as_str(), Some(StopContainerOptions { t: i64::from(grace_secs) }))
            .await
            .map_err(map_err)
    }

    async fn restart(&self, container: &ContainerId, grace_secs: u32) -> Result<(), EngineError> {
        self.docker
            .restart_container(
                container.as_str(),
                Some(RestartContainerOptions { t: grace_secs as isize }),
            )
            .await
            .map_err(map_err)
    }

    async fn remove(&self, container: &ContainerId, force: bool) -> Result<(), EngineError> {
        self.docker
            .remove_container(
                container.as_str(),
                Some(RemoveContainerOptions { force, ..Default::default() }),
            )
            .await
            .map_err(map_err)
    }

    async fn attach(&self, container: &ContainerId) -> Result<AttachStreams, EngineError> {
        let state = self.inspect(container).await?;
        let results = self
            .docker
            .attach_container(
                container.as_str(),
                Some(AttachContainerOptions::<String> {
                    stdin: Some(true),
                    stdout: Some(true),
                    stderr: Some(true),
                    stream: Some(true),
                    logs: Some(false),
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_err)?;

        let cancel = CancellationToken::new();
        let (out_tx, out_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (in_tx, mut in_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_DEPTH);

        let mut output = results.output;
        let reader_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader_cancel.cancelled() => break,
                    item = output.next() => match item {
                        Some(Ok(log)) => {
                            if out_tx.send(Ok(chunk_from_log_output(log))).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            let _ = out_tx.send(Err(map_err(e))).await;
                            break;
                        }
                        None => break,
                    },
                }
            }
        });

        let mut input = results.input;
        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_cancel.cancelled() => break,
                    bytes = in_rx.recv() => match bytes {
                        Some(bytes) => {
                            if input.write_all(&bytes).await.is_err() {
                                break;
                            }
                            if input.flush().await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Ok(AttachStreams { output: out_rx, input: in_tx, cancel, tty: state.tty })
    }

    async fn exec(&self, container: &ContainerId, argv: &[String]) -> Result<ExecOutput, EngineError> {
        let exec = self
            .docker
            .create_exec::<String>(
                container.as_str(),
                CreateExecOptions {
                    cmd: Some(argv.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(map_err)?;

        let mut out = ExecOutput::default();
        match self.docker.start_exec(&exec.id, None).await.map_err(map_err)? {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(item) = output.next().await {
                    match item.map_err(map_err)? {
                        LogOutput::StdErr { message } => out.stderr.extend_from_slice(&message),
                        LogOutput::StdOut { message } | LogOutput::Console { message } => {
                            out.stdout.extend_from_slice(&message)
                        }
                        LogOutput::StdIn { .. } => {}
                    }
                }
            }
            StartExecResults::Detached => {}
        }

        let inspect = self.docker.inspect_exec(&exec.id).await.map_err(map_err)?;
        out.exit_code = inspect.exit_code.unwrap_or(0);
        Ok(out)
    }

    async fn logs(
        &self,
        container: &ContainerId,
        request: &LogsRequest,
    ) -> Result<mpsc::Receiver<Result<AttachChunk, EngineError>>, EngineError> {
        let options = LogsOptions::<String> {
            follow: request.follow,
            stdout: true,
            stderr: true,
            since: request.since.map(|t| t.timestamp()).unwrap_or(0),
            until: request.until.map(|t| t.timestamp()).unwrap_or(0),
            timestamps: false,
            tail: request.tail.map(|n| n.to_string()).unwrap_or_else(|| "all".to_string()),
        };
        let mut stream = self.docker.logs(container.as_str(), Some(options));
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                let msg = item.map(chunk_from_log_output).map_err(map_err);
                if tx.send(msg).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn events(
        &self,
        label: Option<(String, String)>,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<Result<EngineEvent, EngineError>>, EngineError> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        filters.insert("type".to_string(), vec!["container".to_string(), "image".to_string()]);
        if let Some((key, value)) = label {
            filters.insert("label".to_string(), vec![format!("{key}={value}")]);
        }
        let mut stream = self.docker.events(Some(EventsOptions::<String> {
            since: None,
            until: None,
            filters,
        }));

        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    item = stream.next() => match item {
                        Some(Ok(msg)) => {
                            if let Some(event) = event_from_message(msg) {
                                if tx.send(Ok(event)).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "engine event stream error");
                            let _ = tx.send(Err(map_err(e))).await;
                            break;
                        }
                        None => break,
                    },
                }
            }
        });
        Ok(rx)
    }

    async fn copy_to(
        &self,
        container: &ContainerId,
        dest_path: &str,
        tar_bytes: Vec<u8>,
    ) -> Result<(), EngineError> {
        self.docker
            .upload_to_container(
                container.as_str(),
                Some(UploadToContainerOptions {
                    path: dest_path.to_string(),
                    ..Default::default()
                }),
                tar_bytes.into(),
            )
            .await
            .map_err(map_err)
    }

    async fn copy_from(&self, container: &ContainerId, path: &str) -> Result<Vec<u8>, EngineError> {
        let mut stream = self.docker.download_from_container(
            container.as_str(),
            Some(DownloadFromContainerOptions { path: path.to_string() }),
        );
        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk.map_err(map_err)?);
        }
        Ok(bytes)
    }

    async fn resize(&self, container: &ContainerId, rows: u16, cols: u16) -> Result<(), EngineError> {
        self.docker
            .resize_container_tty(
                container.as_str(),
                ResizeContainerTtyOptions { height: rows, width: cols },
            )
            .await
            .map_err(map_err)
    }

    async fn stats_once(&self, container: &ContainerId) -> Result<StatsSample, EngineError> {
        let mut stream = self.docker.stats(
            container.as_str(),
            Some(StatsOptions { stream: false, one_shot: false }),
        );
        match stream.next().await {
            Some(Ok(stats)) => Ok(sample_from_stats(&stats)),
            Some(Err(e)) => Err(map_err(e)),
            None => Err(EngineError::Unavailable("stats stream ended".to_string())),
        }
    }

    async fn container_volumes(&self, container: &ContainerId) -> Result<Vec<MountInfo>, EngineError> {
        let resp = self
            .docker
            .inspect_container(container.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_err)?;
        Ok(resp.mounts.as_ref().map(|m| m.iter().map(mount_info).collect()).unwrap_or_default())
    }
}
