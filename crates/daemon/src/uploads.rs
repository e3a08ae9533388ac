// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP upload endpoint for game servers.
//!
//! `POST /uploads?gameServerId=&destPath=&volumeName=&fileName=&fileSize=`
//! with a single multipart `file` field. The body is wrapped into a tar
//! entry and delivered through the filesystem gateway.

use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use sv_core::{Permission, Status, WorkloadKind};
use sv_engine::files::{archive, ArchiveEntry};
use sv_wire::files::FileBackend;
use sv_wire::http_status_for;

use crate::auth::{authenticate, RequestMeta};
use crate::rpc::deployments::load_workload;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    pub game_server_id: String,
    pub dest_path: String,
    #[serde(default)]
    pub volume_name: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

pub async fn upload_entry(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let meta = RequestMeta::from_headers(&headers);
    match handle_upload(&state, &meta, query, multipart).await {
        Ok(()) => {
            (StatusCode::OK, axum::Json(serde_json::json!({"success": true}))).into_response()
        }
        Err(status) => {
            let http = StatusCode::from_u16(http_status_for(status.code))
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                http,
                axum::Json(serde_json::json!({"success": false, "error": status.message})),
            )
                .into_response()
        }
    }
}

async fn handle_upload(
    state: &AppState,
    meta: &RequestMeta,
    query: UploadQuery,
    mut multipart: Multipart,
) -> Result<(), Status> {
    let ctx = authenticate(&state.config, state.verifier.as_ref(), meta).await?;
    let workload = load_workload(
        state,
        &ctx,
        &query.game_server_id,
        WorkloadKind::GameServer,
        Permission::Update,
    )
    .await?;

    // Single `file` field carries the payload.
    let mut file_bytes: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Status::invalid_argument(format!("multipart: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .or_else(|| query.file_name.clone())
            .ok_or_else(|| Status::invalid_argument("missing file name"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Status::invalid_argument(format!("multipart read: {e}")))?;
        file_bytes = Some((name, bytes.to_vec()));
        break;
    }
    let (file_name, bytes) =
        file_bytes.ok_or_else(|| Status::invalid_argument("missing file field"))?;

    if let Some(declared) = query.file_size {
        if declared != bytes.len() as u64 {
            return Err(Status::invalid_argument(format!(
                "size mismatch: received {} bytes, declared {declared}",
                bytes.len()
            )));
        }
    }

    let backend =
        if query.volume_name.is_some() { FileBackend::Volume } else { FileBackend::Container };
    let target = state
        .gateway
        .resolve_backend(&workload.id, backend, query.volume_name.as_deref(), None, None)
        .await?;

    // Wrap into a tar entry so zip expansion applies on the way in.
    let tar_bytes = archive::build_tar(&[ArchiveEntry::file(file_name, bytes)])?;
    state.gateway.upload(&target, &query.dest_path, tar_bytes).await
}
