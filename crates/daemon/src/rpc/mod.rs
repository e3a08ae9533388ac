// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC plumbing shared by every handler.
//!
//! Handler order is fixed: authenticate → permission/quota (inside the
//! engine ops) → forwarding decision → core operation → response.
//! Streaming methods authenticate explicitly up front.

pub mod deployments;
pub mod files;
pub mod gameservers;
pub mod streams;

use std::convert::Infallible;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;

use sv_core::{CallContext, Status, WorkloadId};
use sv_engine::AuditEntry;
use sv_wire::{http_status_for, ErrorBody};

use crate::auth::RequestMeta;
use crate::server::AppState;

/// JSON error response with the mapped HTTP status.
pub fn error_response(status: Status) -> Response {
    let http = StatusCode::from_u16(http_status_for(status.code))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (http, axum::Json(ErrorBody::from(status))).into_response()
}

pub fn json_response<T: Serialize>(value: &T) -> Response {
    axum::Json(serde_json::to_value(value).unwrap_or_default()).into_response()
}

/// Raw passthrough for responses proxied from another node.
pub fn passthrough_response(bytes: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], bytes).into_response()
}

/// Newline-delimited JSON streaming body fed from a channel.
pub fn ndjson_response(rx: mpsc::Receiver<String>) -> Response {
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        let line = rx.recv().await?;
        Some((Ok::<Bytes, Infallible>(Bytes::from(format!("{line}\n"))), rx))
    });
    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Status> {
    serde_json::from_slice(body)
        .map_err(|e| Status::invalid_argument(format!("invalid request body: {e}")))
}

/// Pull the target workload id out of a request body for auditing and
/// forwarding, whichever field the service uses.
pub fn workload_id_from_body(body: &Bytes) -> Option<WorkloadId> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    ["deploymentId", "gameServerId", "workloadId"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(WorkloadId::new)
}

/// Organization id carried on the request body, for tenant-scoped audit
/// entries.
pub fn org_id_from_body(body: &Bytes) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .get("organizationId")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Fire the audit entry for a completed unary call. Always detached;
/// audit failures never surface.
#[allow(clippy::too_many_arguments)]
pub fn emit_audit(
    state: &AppState,
    ctx: &CallContext,
    org_id: Option<String>,
    service: &str,
    action: &str,
    resource_id: &str,
    request: Option<String>,
    error: Option<&Status>,
    started: Instant,
) {
    let entry = AuditEntry {
        user_id: ctx.user_opt().map(|u| u.to_string()),
        organization_id: org_id,
        action: action.to_string(),
        service: service.to_string(),
        resource_type: service.trim_end_matches('s').to_string(),
        resource_id: resource_id.to_string(),
        client_ip: ctx.client_ip.clone(),
        user_agent: ctx.user_agent.clone(),
        request,
        response_status: match error {
            None => "ok".to_string(),
            Some(status) => status.code.as_str().to_string(),
        },
        error: error.map(|s| s.message.clone()),
        duration_ms: started.elapsed().as_millis() as u64,
        at: state.rt.clock.now(),
    };
    state.rt.audit.emit(entry);
}

/// Methods that mutate state and therefore get audited.
pub fn is_audited(method: &str) -> bool {
    !method.starts_with("Get") && !method.starts_with("List") && !method.starts_with("Stream")
}

/// Forwarding decision for a container-scoped method: when the owning
/// node is remote, proxy the call there and hand back its bytes.
pub async fn maybe_forward_unary(
    state: &AppState,
    meta: &RequestMeta,
    method_path: &str,
    body: &Bytes,
    workload: &WorkloadId,
    container_id: Option<&str>,
    service_name: Option<&str>,
) -> Result<Option<Bytes>, Status> {
    let location =
        match state.lifecycle.registry().find(workload, container_id, service_name, true).await {
            Ok(location) => location,
            // No locations yet: operate locally (which may auto-redeploy).
            Err(status) if status.code == sv_core::ErrorCode::NotFound => return Ok(None),
            Err(status) => return Err(status),
        };
    match state.forwarder.should_forward(&location).map_err(Status::from)? {
        sv_adapters::ForwardTarget::Local => Ok(None),
        sv_adapters::ForwardTarget::Remote { base_url, .. } => {
            let bytes = state
                .forwarder
                .forward_unary(&base_url, method_path, body.clone(), &meta.forwarded_headers())
                .await
                .map_err(Status::from)?;
            Ok(Some(bytes))
        }
    }
}
