// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Router wiring and shared handler state.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use tower_http::cors::CorsLayer;

use sv_adapters::NodeForwarder;
use sv_engine::{FilesGateway, LifecycleEngine, Runtime};

use crate::auth::{RequestMeta, TokenVerifier};
use crate::config::Config;
use crate::rpc;
use crate::rpc::gameservers::{ModCatalog, PlayerIdentity};
use crate::terminal;
use crate::uploads;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rt: Runtime,
    pub lifecycle: LifecycleEngine,
    pub gateway: FilesGateway,
    pub forwarder: Arc<NodeForwarder>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub catalog: Arc<dyn ModCatalog>,
    pub players: Arc<dyn PlayerIdentity>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        rt: Runtime,
        forwarder: Arc<NodeForwarder>,
        verifier: Arc<dyn TokenVerifier>,
        catalog: Arc<dyn ModCatalog>,
        players: Arc<dyn PlayerIdentity>,
    ) -> Self {
        let lifecycle = LifecycleEngine::new(rt.clone());
        let gateway = FilesGateway::new(Arc::clone(&rt.engine), lifecycle.registry().clone());
        Self { config, rt, lifecycle, gateway, forwarder, verifier, catalog, players }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/rpc/deployments/{method}", post(deployments_entry))
        .route("/rpc/gameservers/{method}", post(gameservers_entry))
        .route("/terminal/ws", get(terminal::ws_entry))
        .route("/uploads", post(uploads::upload_entry))
        .route("/healthz", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn deployments_entry(
    State(state): State<AppState>,
    Path(method): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let meta = RequestMeta::from_headers(&headers);
    rpc::deployments::dispatch(state, method, meta, body).await
}

async fn gameservers_entry(
    State(state): State<AppState>,
    Path(method): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let meta = RequestMeta::from_headers(&headers);
    rpc::gameservers::dispatch(state, method, meta, body).await
}

/// 404 for unknown RPC methods, mapped as `Unimplemented`.
pub fn unknown_method(service: &str, method: &str) -> Response {
    rpc::error_response(sv_core::Status::unimplemented(format!(
        "unknown method {service}/{method}"
    )))
    .into_response()
}
