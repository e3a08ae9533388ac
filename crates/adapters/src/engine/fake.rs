// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable in-memory engine for tests.
//!
//! Exported behind the `test-support` feature so downstream crates can
//! exercise engine-facing logic without a Docker daemon.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sv_core::{ContainerId, LocationStatus, StreamKind};

use super::{
    AttachChunk, AttachStreams, ContainerEngine, CreateContainerSpec, EngineError, EngineEvent,
    EngineState, ExecOutput, LogsRequest, MountInfo, StatsSample,
};

#[derive(Default)]
struct FakeContainer {
    state: EngineState,
    log_lines: Vec<AttachChunk>,
    exec_results: HashMap<String, ExecOutput>,
    stats: StatsSample,
    copy_from_results: HashMap<String, Vec<u8>>,
}

#[derive(Default)]
struct Inner {
    containers: HashMap<ContainerId, FakeContainer>,
    created: Vec<CreateContainerSpec>,
    exec_calls: Vec<(ContainerId, Vec<String>)>,
    copied_in: Vec<(ContainerId, String, Vec<u8>)>,
    resizes: Vec<(ContainerId, u16, u16)>,
    stdin_written: Vec<u8>,
    event_subs: Vec<mpsc::Sender<Result<EngineEvent, EngineError>>>,
    live_logs: Vec<(ContainerId, mpsc::Sender<Result<AttachChunk, EngineError>>)>,
    live_attach: Vec<(ContainerId, mpsc::Sender<Result<AttachChunk, EngineError>>)>,
    fail_next: Option<EngineError>,
}

/// In-memory [`ContainerEngine`] with scripting hooks.
#[derive(Clone, Default)]
pub struct FakeEngine {
    inner: Arc<Mutex<Inner>>,
    counter: Arc<AtomicU64>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container with the given state.
    pub fn put_container(&self, id: &str, state: EngineState) {
        self.inner
            .lock()
            .containers
            .insert(ContainerId::new(id), FakeContainer { state, ..Default::default() });
    }

    /// Shorthand: a running container labeled for `workload_id`.
    pub fn put_running(&self, id: &str, workload_id: &str) {
        let mut labels = HashMap::new();
        labels.insert(super::WORKLOAD_LABEL.to_string(), workload_id.to_string());
        self.put_container(
            id,
            EngineState {
                running: true,
                status: LocationStatus::Running,
                labels,
                ..Default::default()
            },
        );
    }

    pub fn set_state(&self, id: &str, f: impl FnOnce(&mut EngineState)) {
        if let Some(c) = self.inner.lock().containers.get_mut(id) {
            f(&mut c.state);
        }
    }

    pub fn push_log(&self, id: &str, stream: StreamKind, bytes: &[u8]) {
        if let Some(c) = self.inner.lock().containers.get_mut(id) {
            c.log_lines.push(AttachChunk { stream, bytes: bytes.to_vec() });
        }
    }

    /// Push a line to any live follow-mode log subscribers and attaches.
    pub fn push_live(&self, id: &str, stream: StreamKind, bytes: &[u8]) {
        let inner = self.inner.lock();
        let chunk = AttachChunk { stream, bytes: bytes.to_vec() };
        for (cid, tx) in inner.live_logs.iter().chain(inner.live_attach.iter()) {
            if cid.as_str() == id {
                let _ = tx.try_send(Ok(chunk.clone()));
            }
        }
    }

    pub fn script_exec(&self, id: &str, argv: &[&str], output: ExecOutput) {
        if let Some(c) = self.inner.lock().containers.get_mut(id) {
            c.exec_results.insert(argv.join(" "), output);
        }
    }

    pub fn script_copy_from(&self, id: &str, path: &str, tar_bytes: Vec<u8>) {
        if let Some(c) = self.inner.lock().containers.get_mut(id) {
            c.copy_from_results.insert(path.to_string(), tar_bytes);
        }
    }

    pub fn script_stats(&self, id: &str, stats: StatsSample) {
        if let Some(c) = self.inner.lock().containers.get_mut(id) {
            c.stats = stats;
        }
    }

    /// Fail the next engine call with the given error.
    pub fn fail_next(&self, err: EngineError) {
        self.inner.lock().fail_next = Some(err);
    }

    pub fn emit_event(&self, event: EngineEvent) {
        let subs: Vec<_> = self.inner.lock().event_subs.clone();
        for tx in subs {
            let _ = tx.try_send(Ok(event.clone()));
        }
    }

    pub fn created_specs(&self) -> Vec<CreateContainerSpec> {
        self.inner.lock().created.clone()
    }

    pub fn exec_calls(&self) -> Vec<(ContainerId, Vec<String>)> {
        self.inner.lock().exec_calls.clone()
    }

    pub fn copied_in(&self) -> Vec<(ContainerId, String, Vec<u8>)> {
        self.inner.lock().copied_in.clone()
    }

    pub fn resizes(&self) -> Vec<(ContainerId, u16, u16)> {
        self.inner.lock().resizes.clone()
    }

    pub fn stdin_written(&self) -> Vec<u8> {
        self.inner.lock().stdin_written.clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().containers.contains_key(id)
    }

    fn take_fail(&self) -> Option<EngineError> {
        self.inner.lock().fail_next.take()
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn inspect(&self, container: &ContainerId) -> Result<EngineState, EngineError> {
        if let Some(err) = self.take_fail() {
            return Err(err);
        }
        let inner = self.inner.lock();
        let c = inner
            .containers
            .get(container.as_str())
            .ok_or_else(|| EngineError::NotFound(format!("no such container: {container}")))?;
        if c.state.restarting {
            return Err(EngineError::Transient);
        }
        Ok(c.state.clone())
    }

    async fn list_by_label(
        &self,
        label: &str,
        value: &str,
    ) -> Result<Vec<(ContainerId, EngineState)>, EngineError> {
        if let Some(err) = self.take_fail() {
            return Err(err);
        }
        let inner = self.inner.lock();
        let mut out: Vec<_> = inner
            .containers
            .iter()
            .filter(|(_, c)| c.state.labels.get(label).map(String::as_str) == Some(value))
            .map(|(id, c)| (id.clone(), c.state.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    async fn create(&self, spec: &CreateContainerSpec) -> Result<ContainerId, EngineError> {
        if let Some(err) = self.take_fail() {
            return Err(err);
        }
        let id = ContainerId::new(format!(
            "fake{:016x}",
            self.counter.fetch_add(1, Ordering::Relaxed) + 1
        ));
        let mut inner = self.inner.lock();
        inner.created.push(spec.clone());
        inner.containers.insert(
            id.clone(),
            FakeContainer {
                state: EngineState {
                    status: LocationStatus::Created,
                    image: Some(spec.image.clone()),
                    tty: spec.tty,
                    labels: spec.labels.clone(),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        Ok(id)
    }

    async fn start(&self, container: &ContainerId) -> Result<(), EngineError> {
        if let Some(err) = self.take_fail() {
            return Err(err);
        }
        let mut inner = self.inner.lock();
        let c = inner
            .containers
            .get_mut(container.as_str())
            .ok_or_else(|| EngineError::NotFound(format!("no such container: {container}")))?;
        c.state.running = true;
        c.state.status = LocationStatus::Running;
        c.state.exit_code = None;
        Ok(())
    }

    async fn stop(&self, container: &ContainerId, _grace_secs: u32) -> Result<(), EngineError> {
        if let Some(err) = self.take_fail() {
            return Err(err);
        }
        let mut inner = self.inner.lock();
        let c = inner
            .containers
            .get_mut(container.as_str())
            .ok_or_else(|| EngineError::NotFound(format!("no such container: {container}")))?;
        c.state.running = false;
        c.state.status = LocationStatus::Stopped;
        c.state.exit_code = Some(0);
        Ok(())
    }

    async fn restart(&self, container: &ContainerId, grace_secs: u32) -> Result<(), EngineError> {
        self.stop(container, grace_secs).await?;
        self.start(container).await
    }

    async fn remove(&self, container: &ContainerId, _force: bool) -> Result<(), EngineError> {
        if let Some(err) = self.take_fail() {
            return Err(err);
        }
        self.inner
            .lock()
            .containers
            .remove(container.as_str())
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(format!("no such container: {container}")))
    }

    async fn attach(&self, container: &ContainerId) -> Result<AttachStreams, EngineError> {
        if let Some(err) = self.take_fail() {
            return Err(err);
        }
        let tty = {
            let inner = self.inner.lock();
            let c = inner
                .containers
                .get(container.as_str())
                .ok_or_else(|| EngineError::NotFound(format!("no such container: {container}")))?;
            c.state.tty
        };

        let (out_tx, out_rx) = mpsc::channel(64);
        let (in_tx, mut in_rx) = mpsc::channel::<Vec<u8>>(64);
        self.inner.lock().live_attach.push((container.clone(), out_tx));

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            while let Some(bytes) = in_rx.recv().await {
                inner.lock().stdin_written.extend_from_slice(&bytes);
            }
        });

        Ok(AttachStreams { output: out_rx, input: in_tx, cancel: CancellationToken::new(), tty })
    }

    async fn exec(&self, container: &ContainerId, argv: &[String]) -> Result<ExecOutput, EngineError> {
        if let Some(err) = self.take_fail() {
            return Err(err);
        }
        let mut inner = self.inner.lock();
        if !inner.containers.contains_key(container.as_str()) {
            return Err(EngineError::NotFound(format!("no such container: {container}")));
        }
        inner.exec_calls.push((container.clone(), argv.to_vec()));
        let key = argv.join(" ");
        Ok(inner
            .containers
            .get(container.as_str())
            .and_then(|c| c.exec_results.get(&key).cloned())
            .unwrap_or_default())
    }

    async fn logs(
        &self,
        container: &ContainerId,
        request: &LogsRequest,
    ) -> Result<mpsc::Receiver<Result<AttachChunk, EngineError>>, EngineError> {
        if let Some(err) = self.take_fail() {
            return Err(err);
        }
        let (tx, rx) = mpsc::channel(256);
        let lines = {
            let inner = self.inner.lock();
            let c = inner
                .containers
                .get(container.as_str())
                .ok_or_else(|| EngineError::NotFound(format!("no such container: {container}")))?;
            let lines = c.log_lines.clone();
            match request.tail {
                Some(n) => lines[lines.len().saturating_sub(n as usize)..].to_vec(),
                None => lines,
            }
        };
        for line in lines {
            let _ = tx.try_send(Ok(line));
        }
        if request.follow {
            self.inner.lock().live_logs.push((container.clone(), tx));
        }
        Ok(rx)
    }

    async fn events(
        &self,
        _label: Option<(String, String)>,
        _cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<Result<EngineEvent, EngineError>>, EngineError> {
        let (tx, rx) = mpsc::channel(256);
        self.inner.lock().event_subs.push(tx);
        Ok(rx)
    }

    async fn copy_to(
        &self,
        container: &ContainerId,
        dest_path: &str,
        tar_bytes: Vec<u8>,
    ) -> Result<(), EngineError> {
        if let Some(err) = self.take_fail() {
            return Err(err);
        }
        let mut inner = self.inner.lock();
        if !inner.containers.contains_key(container.as_str()) {
            return Err(EngineError::NotFound(format!("no such container: {container}")));
        }
        inner.copied_in.push((container.clone(), dest_path.to_string(), tar_bytes));
        Ok(())
    }

    async fn copy_from(&self, container: &ContainerId, path: &str) -> Result<Vec<u8>, EngineError> {
        if let Some(err) = self.take_fail() {
            return Err(err);
        }
        let inner = self.inner.lock();
        let c = inner
            .containers
            .get(container.as_str())
            .ok_or_else(|| EngineError::NotFound(format!("no such container: {container}")))?;
        c.copy_from_results
            .get(path)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("no such path: {path}")))
    }

    async fn resize(&self, container: &ContainerId, rows: u16, cols: u16) -> Result<(), EngineError> {
        if let Some(err) = self.take_fail() {
            return Err(err);
        }
        self.inner.lock().resizes.push((container.clone(), rows, cols));
        Ok(())
    }

    async fn stats_once(&self, container: &ContainerId) -> Result<StatsSample, EngineError> {
        if let Some(err) = self.take_fail() {
            return Err(err);
        }
        let inner = self.inner.lock();
        inner
            .containers
            .get(container.as_str())
            .map(|c| c.stats)
            .ok_or_else(|| EngineError::NotFound(format!("no such container: {container}")))
    }

    async fn container_volumes(&self, container: &ContainerId) -> Result<Vec<MountInfo>, EngineError> {
        Ok(self.inspect(container).await?.mounts)
    }
}
