// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming handlers: container/workload logs, build logs, live
//! metrics, game-server status. Frames go out as newline-delimited JSON;
//! a vanished client is a clean close, not an error.

use std::time::Duration;

use axum::response::Response;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use sv_core::{
    aggregate_samples, BuildStatus, CallContext, LogLine, MetricSample, Permission, ResourceType,
    Status, WorkloadId, WorkloadKind,
};
use sv_wire::deployments::{StreamBuildLogsRequest, StreamLogsRequest, StreamMetricsRequest};
use sv_wire::streams::{LogFrame, MetricFrame, StatusFrame};

use crate::auth::RequestMeta;
use crate::rpc::{ndjson_response, parse_body};
use crate::server::AppState;

use super::deployments::load_workload;

/// Channel depth between producers and the HTTP body.
const STREAM_BUFFER: usize = 256;

fn kind_for(service: &str) -> WorkloadKind {
    if service == "gameservers" {
        WorkloadKind::GameServer
    } else {
        WorkloadKind::Deployment
    }
}

fn frame_line<T: serde::Serialize>(frame: &T) -> Option<String> {
    serde_json::to_string(frame).ok()
}

pub(crate) fn build_log_frame(line: &LogLine) -> LogFrame {
    LogFrame {
        at: line.at,
        level: sv_core::loglevel::classify(&line.line, line.stream),
        stream: line.stream,
        message: line.line.clone(),
        source: None,
    }
}

/// Forward a streaming method to the owning node when the target
/// container is remote. Returns `None` when the call is local.
async fn maybe_forward_stream(
    state: &AppState,
    meta: &RequestMeta,
    method_path: &str,
    body: &Bytes,
    workload: &WorkloadId,
    container_id: Option<&str>,
    service_name: Option<&str>,
) -> Result<Option<Response>, Status> {
    let location =
        match state.lifecycle.registry().find(workload, container_id, service_name, true).await {
            Ok(location) => location,
            Err(status) if status.code == sv_core::ErrorCode::NotFound => return Ok(None),
            Err(status) => return Err(status),
        };
    match state.forwarder.should_forward(&location).map_err(Status::from)? {
        sv_adapters::ForwardTarget::Local => Ok(None),
        sv_adapters::ForwardTarget::Remote { base_url, .. } => {
            let (tx, rx) = mpsc::channel(STREAM_BUFFER);
            let forwarder = std::sync::Arc::clone(&state.forwarder);
            let method_path = method_path.to_string();
            let body = body.clone();
            let headers = meta.forwarded_headers();
            tokio::spawn(async move {
                if let Err(e) = forwarder
                    .forward_server_stream(&base_url, &method_path, body, &headers, tx)
                    .await
                {
                    debug!(error = %e, "forwarded stream ended with error");
                }
            });
            Ok(Some(ndjson_response(rx)))
        }
    }
}

/// `StreamContainerLogs` / `StreamDeploymentLogs` / game-server mirrors.
pub async fn stream_workload_logs(
    state: &AppState,
    ctx: &CallContext,
    meta: &RequestMeta,
    service: &str,
    method: &str,
    body: &Bytes,
) -> Result<Response, Status> {
    let req: StreamLogsRequest = parse_body(body)?;
    let w = load_workload(state, ctx, &req.workload_id, kind_for(service), Permission::View)
        .await?;

    let method_path = format!("/rpc/{service}/{method}");
    if let Some(response) = maybe_forward_stream(
        state,
        meta,
        &method_path,
        body,
        &w.id,
        req.container_id.as_deref(),
        req.service_name.as_deref(),
    )
    .await?
    {
        return Ok(response);
    }

    // Workload-level streaming follows every location; container-level
    // streaming follows exactly the requested one.
    let locations = if method == "StreamContainerLogs" || req.container_id.is_some() {
        vec![
            state
                .lifecycle
                .registry()
                .find(&w.id, req.container_id.as_deref(), req.service_name.as_deref(), true)
                .await?,
        ]
    } else {
        let all = state.lifecycle.registry().validate_and_refresh(&w.id).await?;
        if all.is_empty() {
            return Err(Status::not_found(format!("no containers for workload {}", w.id)));
        }
        all
    };

    let (tx, rx) = mpsc::channel::<String>(STREAM_BUFFER);
    let cancel = CancellationToken::new();
    let container_ids: Vec<_> = locations.iter().map(|l| l.container_id.clone()).collect();

    for location in locations {
        let mut line_rx = sv_engine::logstream::stream_container_logs(
            std::sync::Arc::clone(&state.rt.engine),
            std::sync::Arc::clone(&state.rt.clock),
            w.id.clone(),
            location.container_id.clone(),
            container_ids.clone(),
            w.image.clone().into_iter().collect(),
            req.tail,
            cancel.clone(),
        )
        .await?;

        let tx = tx.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                let frame = LogFrame {
                    at: line.at,
                    level: line.level,
                    stream: line.stream,
                    message: line.message,
                    source: Some(line.source),
                };
                let Some(encoded) = frame_line(&frame) else { continue };
                if tx.send(encoded).await.is_err() {
                    // Client went away; tear down the source streams.
                    cancel.cancel();
                    break;
                }
            }
        });
    }
    Ok(ndjson_response(rx))
}

/// `StreamBuildLogs`: ring snapshot (or store replay) then live lines.
pub async fn stream_build_logs(
    state: &AppState,
    ctx: &CallContext,
    service: &str,
    body: &Bytes,
) -> Result<Response, Status> {
    let req: StreamBuildLogsRequest = parse_body(body)?;
    let w = load_workload(state, ctx, &req.workload_id, kind_for(service), Permission::View)
        .await?;

    let (snapshot, mut live) = state.rt.build_logs.subscribe(&w.id);

    // Empty ring + build in flight means the process restarted mid-build;
    // replay from the time-series store instead.
    let snapshot = if snapshot.is_empty() {
        let building = state
            .rt
            .builds
            .list_builds(&w.id)
            .await?
            .into_iter()
            .find(|b| b.status == BuildStatus::Building);
        match (&building, &req.build_id) {
            (Some(build), _) => state.rt.build_logs.replay_from_store(&build.id).await,
            (None, Some(build_id)) => {
                state.rt.build_logs.replay_from_store(&sv_core::BuildId::new(&**build_id)).await
            }
            (None, None) => snapshot,
        }
    } else {
        snapshot
    };

    let (tx, rx) = mpsc::channel::<String>(STREAM_BUFFER);
    tokio::spawn(async move {
        for line in &snapshot {
            let Some(encoded) = frame_line(&build_log_frame(line)) else { continue };
            if tx.send(encoded).await.is_err() {
                return;
            }
        }
        while let Some(line) = live.recv().await {
            let Some(encoded) = frame_line(&build_log_frame(&line)) else { continue };
            if tx.send(encoded).await.is_err() {
                return;
            }
        }
    });
    Ok(ndjson_response(rx))
}

/// `StreamLiveMetrics` / `StreamGameServerMetrics`.
pub async fn stream_live_metrics(
    state: &AppState,
    ctx: &CallContext,
    meta: &RequestMeta,
    service: &str,
    body: &Bytes,
    resource_type: ResourceType,
) -> Result<Response, Status> {
    let req: StreamMetricsRequest = parse_body(body)?;
    let w = load_workload(state, ctx, &req.workload_id, kind_for(service), Permission::View)
        .await?;

    let method_path = format!("/rpc/{service}/StreamLiveMetrics");
    if let Some(response) =
        maybe_forward_stream(state, meta, &method_path, body, &w.id, None, None).await?
    {
        return Ok(response);
    }

    // First subscriber boots the poller; it exits again once the
    // subscriber set drains.
    let had_subscribers = state.rt.metrics.subscriber_count(w.id.as_str()) > 0;
    let mut subscription = state.rt.metrics.subscribe(w.id.as_str());
    if !had_subscribers {
        sv_engine::metrics::spawn_poller(
            state.rt.metrics.clone(),
            std::sync::Arc::clone(&state.rt.engine),
            std::sync::Arc::clone(&state.rt.locations_repo),
            std::sync::Arc::clone(&state.rt.metrics_repo),
            std::sync::Arc::clone(&state.rt.clock),
            w.id.clone(),
            resource_type,
            sv_engine::metrics::POLL_PERIOD,
            CancellationToken::new(),
        );
    }

    let (tx, rx) = mpsc::channel::<String>(STREAM_BUFFER);
    let streamer = state.rt.metrics.clone();
    let clock = std::sync::Arc::clone(&state.rt.clock);
    let workload_id = w.id.clone();
    let aggregate = req.aggregate;
    tokio::spawn(async move {
        // Aggregation groups samples sharing one instant; hold the batch
        // until the instant rolls over.
        let mut pending: Vec<MetricSample> = Vec::new();
        loop {
            let sample = sv_engine::metrics::recv_with_heartbeat(
                &mut subscription,
                resource_type,
                workload_id.as_str(),
                &clock,
            )
            .await;
            let Some(sample) = sample else { break };

            let outgoing: Vec<MetricSample> = if !aggregate {
                vec![sample]
            } else if pending.last().is_some_and(|p| p.at != sample.at) {
                let batch = aggregate_samples(&pending);
                pending = vec![sample];
                batch
            } else {
                pending.push(sample);
                Vec::new()
            };

            for sample in outgoing {
                let Some(encoded) = frame_line(&MetricFrame { sample }) else { continue };
                if tx.send(encoded).await.is_err() {
                    streamer.unsubscribe(workload_id.as_str(), subscription.id);
                    return;
                }
            }
        }
        // Upstream closed; the last instant's batch still goes out.
        if aggregate && !pending.is_empty() {
            for sample in aggregate_samples(&pending) {
                let Some(encoded) = frame_line(&MetricFrame { sample }) else { continue };
                if tx.send(encoded).await.is_err() {
                    break;
                }
            }
        }
        streamer.unsubscribe(workload_id.as_str(), subscription.id);
    });
    Ok(ndjson_response(rx))
}

/// `StreamGameServerStatus`: status frames on change plus a keep-alive
/// tick.
pub async fn stream_game_server_status(
    state: &AppState,
    ctx: &CallContext,
    body: &Bytes,
) -> Result<Response, Status> {
    let req: sv_wire::gameservers::StreamGameServerStatusRequest = parse_body(body)?;
    let w = load_workload(
        state,
        ctx,
        &req.game_server_id,
        WorkloadKind::GameServer,
        Permission::View,
    )
    .await?;

    let (tx, rx) = mpsc::channel::<String>(STREAM_BUFFER);
    let rt = state.rt.clone();
    let id = w.id;
    tokio::spawn(async move {
        let mut last: Option<(sv_core::LifecycleStatus, sv_core::WorkloadHealth)> = None;
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Ok(Some(workload)) = rt.workloads.get_by_id(&id).await else { break };
            let current = (workload.status, workload.health);
            if last == Some(current) {
                continue;
            }
            last = Some(current);
            let frame = StatusFrame {
                at: rt.clock.now(),
                status: workload.status,
                status_code: workload.status.code(),
                health: workload.health.as_str().to_string(),
            };
            let Some(encoded) = frame_line(&frame) else { continue };
            if tx.send(encoded).await.is_err() {
                break;
            }
        }
    });
    Ok(ndjson_response(rx))
}
