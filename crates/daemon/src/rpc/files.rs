// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-surface handlers shared by both services.
//!
//! Read operations need the `read` permission, mutations the `update`
//! permission; container-backend calls are forwarded to the owning node.

use axum::response::Response;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;

use sv_core::{CallContext, Permission, Status, WorkloadKind};
use sv_engine::files::BackendTarget;
use sv_wire::files::*;

use crate::auth::RequestMeta;
use crate::rpc::{json_response, parse_body};
use crate::server::AppState;

use super::deployments::load_workload;

fn kind_for(service: &str) -> WorkloadKind {
    if service == "gameservers" {
        WorkloadKind::GameServer
    } else {
        WorkloadKind::Deployment
    }
}

/// Which permission a file method needs.
fn permission_for(method: &str) -> Permission {
    match method {
        "ListContainerFiles" | "GetContainerFile" | "SearchContainerFiles" => Permission::Read,
        _ => Permission::Update,
    }
}

pub async fn dispatch(
    state: &AppState,
    ctx: &CallContext,
    meta: &RequestMeta,
    service: &str,
    method: &str,
    body: &Bytes,
) -> Result<Response, Status> {
    // Every file request names the workload the same way; peek at it for
    // the permission check and the forwarding decision.
    let common: FileRequestCommon = parse_body(body)?;
    let w = load_workload(state, ctx, &common.workload_id, kind_for(service), permission_for(method))
        .await?;

    let method_path = format!("/rpc/{service}/{method}");
    if let Some(bytes) = super::maybe_forward_unary(
        state,
        meta,
        &method_path,
        body,
        &w.id,
        common.container_id.as_deref(),
        common.service_name.as_deref(),
    )
    .await?
    {
        return Ok(super::passthrough_response(bytes));
    }

    let game_server = w.kind == WorkloadKind::GameServer;
    match method {
        "ListContainerFiles" => {
            let req: ListFilesRequest = parse_body(body)?;
            let target = resolve(state, &w, &req.backend, &req.volume_name, &common).await?;
            let page = state.gateway.list(&target, &req.path, req.cursor, req.page_size).await?;
            Ok(json_response(&ListFilesResponse {
                current_path: page.current_path,
                entries: page.entries,
                has_more: page.has_more,
                next_cursor: page.next_cursor,
            }))
        }
        "GetContainerFile" => {
            let req: GetFileRequest = parse_body(body)?;
            let target = resolve(state, &w, &req.backend, &req.volume_name, &common).await?;
            let content = state.gateway.get(&target, &req.path).await?;
            Ok(json_response(&GetFileResponse {
                path: content.path,
                content: content.content,
                encoding: content.encoding,
                size_bytes: content.size_bytes,
            }))
        }
        "SearchContainerFiles" => {
            let req: SearchByNameRequest = parse_body(body)?;
            let target = resolve(state, &w, &req.backend, &req.volume_name, &common).await?;
            let entries = state.gateway.search(&target, &req.path, &req.query).await?;
            Ok(json_response(&SearchByNameResponse { entries }))
        }
        "UploadContainerFiles" => {
            let req: UploadFilesRequest = parse_body(body)?;
            let target = resolve(state, &w, &req.backend, &req.volume_name, &common).await?;
            let tar_bytes = BASE64
                .decode(req.tar_base64.as_bytes())
                .map_err(|e| Status::invalid_argument(format!("invalid tar payload: {e}")))?;
            state.gateway.upload(&target, &req.destination_path, tar_bytes).await?;
            Ok(json_response(&UploadFilesResponse::default()))
        }
        "WriteContainerFile" => {
            let req: WriteFileRequest = parse_body(body)?;
            let target = resolve(state, &w, &req.backend, &req.volume_name, &common).await?;
            let content = match req.encoding.as_deref() {
                Some("base64") => BASE64
                    .decode(req.content.as_bytes())
                    .map_err(|e| Status::invalid_argument(format!("invalid base64: {e}")))?,
                _ => req.content.into_bytes(),
            };
            state
                .gateway
                .write(&target, &req.path, &content, req.create_if_missing, req.mode, game_server)
                .await?;
            Ok(json_response(&WriteFileResponse::default()))
        }
        "DeleteContainerEntries" => {
            let req: DeleteEntriesRequest = parse_body(body)?;
            let target = resolve(state, &w, &req.backend, &req.volume_name, &common).await?;
            state.gateway.delete(&target, &req.paths, req.recursive, req.force).await?;
            Ok(json_response(&DeleteEntriesResponse::default()))
        }
        "CreateContainerEntry" => {
            let req: CreateEntryRequest = parse_body(body)?;
            let target = resolve(state, &w, &req.backend, &req.volume_name, &common).await?;
            state
                .gateway
                .create_entry(&target, &req.path, req.kind, req.template.as_deref())
                .await?;
            Ok(json_response(&CreateEntryResponse::default()))
        }
        "RenameContainerEntry" => {
            let req: RenameEntryRequest = parse_body(body)?;
            let target = resolve(state, &w, &req.backend, &req.volume_name, &common).await?;
            state.gateway.rename(&target, &req.from_path, &req.to_path, req.overwrite).await?;
            Ok(json_response(&RenameEntryResponse::default()))
        }
        "ExtractDeploymentFile" | "ExtractGameServerFile" => {
            let req: ExtractFileRequest = parse_body(body)?;
            let target = resolve(state, &w, &req.backend, &req.volume_name, &common).await?;
            state.gateway.extract(&target, &req.archive_path, &req.destination_path).await?;
            Ok(json_response(&ExtractFileResponse::default()))
        }
        "CreateDeploymentFileArchive" | "CreateGameServerFileArchive" => {
            let req: CreateArchiveRequest = parse_body(body)?;
            let target = resolve(state, &w, &req.backend, &req.volume_name, &common).await?;
            let archive_path = state
                .gateway
                .archive(&target, &req.source_paths, &req.destination_path, req.include_parent_folder)
                .await?;
            Ok(json_response(&CreateArchiveResponse { archive_path }))
        }
        other => Err(Status::unimplemented(format!("unknown file method {other}"))),
    }
}

async fn resolve(
    state: &AppState,
    workload: &sv_core::Workload,
    backend: &FileBackend,
    volume_name: &Option<String>,
    common: &FileRequestCommon,
) -> Result<BackendTarget, Status> {
    state
        .gateway
        .resolve_backend(
            &workload.id,
            *backend,
            volume_name.as_deref(),
            common.container_id.as_deref(),
            common.service_name.as_deref(),
        )
        .await
}

/// The fields every file request shares.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRequestCommon {
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
}
