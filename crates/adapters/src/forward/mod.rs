// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-node request forwarding.
//!
//! When the target container lives on another node, the handler proxies
//! the call there and surfaces the peer's answer unchanged. Hops are
//! never retried; the first error drops the connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use sv_core::{ContainerLocation, NodeId, Status};
use sv_wire::{code_for_http_status, ErrorBody};

use crate::ws::{self, WsDuplex};

/// Headers propagated verbatim on forwarded hops.
const FORWARDED_HEADERS: &[&str] = &["authorization"];

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("node {0} is not reachable")]
    Unreachable(NodeId),
    /// The peer answered with an RPC error; surface it unchanged.
    #[error("{0}")]
    Remote(Status),
    #[error("forwarding transport error: {0}")]
    Transport(String),
}

impl From<ForwardError> for Status {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Remote(status) => status,
            ForwardError::Unreachable(node) => {
                Status::internal(format!("node {node} is not reachable"))
            }
            ForwardError::Transport(msg) => Status::internal(msg),
        }
    }
}

/// Node id → base URL resolution.
pub trait NodeDirectory: Send + Sync {
    fn local_node_id(&self) -> NodeId;
    fn base_url(&self, node: &NodeId) -> Option<String>;
}

/// Directory backed by a static (but updatable) map; the daemon refreshes
/// it from the node repository.
pub struct StaticNodeDirectory {
    local: NodeId,
    nodes: RwLock<HashMap<NodeId, String>>,
}

impl StaticNodeDirectory {
    pub fn new(local: NodeId) -> Self {
        Self { local, nodes: RwLock::new(HashMap::new()) }
    }

    pub fn upsert(&self, node: NodeId, base_url: impl Into<String>) {
        self.nodes.write().insert(node, base_url.into());
    }
}

impl NodeDirectory for StaticNodeDirectory {
    fn local_node_id(&self) -> NodeId {
        self.local.clone()
    }

    fn base_url(&self, node: &NodeId) -> Option<String> {
        self.nodes.read().get(node.as_str()).cloned()
    }
}

/// Outcome of the forwarding decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardTarget {
    Local,
    Remote { node: NodeId, base_url: String },
}

pub struct NodeForwarder {
    client: reqwest::Client,
    directory: Arc<dyn NodeDirectory>,
}

impl NodeForwarder {
    pub fn new(directory: Arc<dyn NodeDirectory>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, directory }
    }

    /// Forward iff the owning node is not this one and is resolvable.
    pub fn should_forward(&self, location: &ContainerLocation) -> Result<ForwardTarget, ForwardError> {
        if location.node_id == self.directory.local_node_id() {
            return Ok(ForwardTarget::Local);
        }
        match self.directory.base_url(&location.node_id) {
            Some(base_url) => {
                Ok(ForwardTarget::Remote { node: location.node_id.clone(), base_url })
            }
            None => Err(ForwardError::Unreachable(location.node_id.clone())),
        }
    }

    /// Proxy a unary call; the response body comes back verbatim.
    pub async fn forward_unary(
        &self,
        base_url: &str,
        method_path: &str,
        body: Bytes,
        headers: &[(String, String)],
    ) -> Result<Bytes, ForwardError> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), method_path);
        debug!(%url, "forwarding unary call");
        let mut request = self.client.post(&url).header("content-type", "application/json").body(body);
        for (name, value) in propagated(headers) {
            request = request.header(name, value);
        }
        let response =
            request.send().await.map_err(|e| ForwardError::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| ForwardError::Transport(e.to_string()))?;
        if status.is_success() {
            Ok(bytes)
        } else {
            Err(ForwardError::Remote(status_from_peer(status.as_u16(), &bytes)))
        }
    }

    /// Proxy a server-streaming call, sending one NDJSON frame at a time.
    ///
    /// A dropped sink means the client went away; that is a clean close.
    pub async fn forward_server_stream(
        &self,
        base_url: &str,
        method_path: &str,
        body: Bytes,
        headers: &[(String, String)],
        sink: mpsc::Sender<String>,
    ) -> Result<(), ForwardError> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), method_path);
        debug!(%url, "forwarding server stream");
        let mut request = self.client.post(&url).header("content-type", "application/json").body(body);
        for (name, value) in propagated(headers) {
            request = request.header(name, value);
        }
        let response =
            request.send().await.map_err(|e| ForwardError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let bytes =
                response.bytes().await.map_err(|e| ForwardError::Transport(e.to_string()))?;
            return Err(ForwardError::Remote(status_from_peer(status.as_u16(), &bytes)));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ForwardError::Transport(e.to_string()))?;
            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
                if line.is_empty() {
                    continue;
                }
                if sink.send(line).await.is_err() {
                    return Ok(());
                }
            }
        }
        if !buffer.is_empty() {
            let _ = sink.send(String::from_utf8_lossy(&buffer).into_owned()).await;
        }
        Ok(())
    }

    /// Open a WebSocket duplex to the peer's endpoint.
    pub async fn forward_websocket(
        &self,
        base_url: &str,
        path: &str,
        headers: &[(String, String)],
    ) -> Result<WsDuplex, ForwardError> {
        let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base_url.to_string()
        };
        let url = format!("{}{}", ws_base.trim_end_matches('/'), path);
        debug!(%url, "forwarding websocket");
        ws::connect_with_headers(&url, &propagated(headers)).await
    }
}

fn propagated(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| FORWARDED_HEADERS.contains(&name.to_ascii_lowercase().as_str()))
        .cloned()
        .collect()
}

/// Map a peer's HTTP answer to a status: a parseable error body passes
/// through unchanged, otherwise 401/403/404 map to their codes and
/// everything else is `Internal`.
fn status_from_peer(http_status: u16, body: &[u8]) -> Status {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return parsed.into();
    }
    Status::new(
        code_for_http_status(http_status),
        format!("forwarded call failed with HTTP {http_status}"),
    )
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
