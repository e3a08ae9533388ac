// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Game servers service handlers.
//!
//! Mirrors the deployments surface with game-server semantics, plus the
//! Minecraft catalog/player lookups (external collaborators behind the
//! [`ModCatalog`] and [`PlayerIdentity`] seams) and chunked uploads.

use std::time::Instant;

use async_trait::async_trait;
use axum::response::Response;
use bytes::Bytes;

use sv_core::{
    CallContext, OrgId, Permission, ResourceType, Status, WorkloadId, WorkloadKind,
};
use sv_engine::NewWorkload;
use sv_wire::deployments::{ContainerOpRequest, ContainerOpResponse, ListContainersResponse};
use sv_wire::files::FileBackend;
use sv_wire::gameservers::*;
use sv_wire::types::{ContainerView, WorkloadView};

use crate::auth::{authenticate, RequestMeta};
use crate::rpc::{
    emit_audit, error_response, is_audited, json_response, parse_body, workload_id_from_body,
};
use crate::server::{unknown_method, AppState};

use super::deployments::{load_workload, spawn_status_sync};

/// External mod/plugin catalog (Modrinth-style) consumed, not implemented.
#[async_trait]
pub trait ModCatalog: Send + Sync {
    async fn search(
        &self,
        query: &str,
        project_type: Option<&str>,
        page: u32,
    ) -> Result<(Vec<MinecraftProject>, u64), Status>;

    /// Fetch one project file; returns its name and bytes.
    async fn fetch_file(
        &self,
        project_id: &str,
        version_id: &str,
    ) -> Result<(String, Vec<u8>), Status>;
}

/// External player identity lookups.
#[async_trait]
pub trait PlayerIdentity: Send + Sync {
    async fn uuid_for_name(&self, player_name: &str) -> Result<String, Status>;

    async fn profile(&self, uuid: &str) -> Result<(String, Option<String>), Status>;
}

/// Placeholders used until the operators wire real clients in.
#[derive(Debug, Clone, Default)]
pub struct NullModCatalog;

#[async_trait]
impl ModCatalog for NullModCatalog {
    async fn search(
        &self,
        _query: &str,
        _project_type: Option<&str>,
        _page: u32,
    ) -> Result<(Vec<MinecraftProject>, u64), Status> {
        Err(Status::unimplemented("mod catalog is not configured"))
    }

    async fn fetch_file(
        &self,
        _project_id: &str,
        _version_id: &str,
    ) -> Result<(String, Vec<u8>), Status> {
        Err(Status::unimplemented("mod catalog is not configured"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NullPlayerIdentity;

#[async_trait]
impl PlayerIdentity for NullPlayerIdentity {
    async fn uuid_for_name(&self, _player_name: &str) -> Result<String, Status> {
        Err(Status::unimplemented("player identity lookups are not configured"))
    }

    async fn profile(&self, _uuid: &str) -> Result<(String, Option<String>), Status> {
        Err(Status::unimplemented("player identity lookups are not configured"))
    }
}

pub async fn dispatch(state: AppState, method: String, meta: RequestMeta, body: Bytes) -> Response {
    let started = Instant::now();
    let ctx = match authenticate(&state.config, state.verifier.as_ref(), &meta).await {
        Ok(ctx) => ctx,
        Err(e) => return error_response(e),
    };

    let result = route(&state, &ctx, &meta, &method, &body).await;
    if is_audited(&method) {
        let resource =
            workload_id_from_body(&body).map(|w| w.to_string()).unwrap_or_default();
        emit_audit(
            &state,
            &ctx,
            super::org_id_from_body(&body),
            "gameservers",
            &method,
            &resource,
            Some(String::from_utf8_lossy(&body).into_owned()),
            result.as_ref().err(),
            started,
        );
    }
    result.unwrap_or_else(error_response)
}

async fn route(
    state: &AppState,
    ctx: &CallContext,
    meta: &RequestMeta,
    method: &str,
    body: &Bytes,
) -> Result<Response, Status> {
    match method {
        "ListGameServers" => {
            let req: ListGameServersRequest = parse_body(body)?;
            Ok(json_response(&list_game_servers(state, ctx, req).await?))
        }
        "GetGameServer" => {
            let req: GetGameServerRequest = parse_body(body)?;
            let w = load_workload(
                state,
                ctx,
                &req.game_server_id,
                WorkloadKind::GameServer,
                Permission::View,
            )
            .await?;
            spawn_status_sync(state, w.id.clone());
            Ok(json_response(&GetGameServerResponse {
                game_server: WorkloadView::from_record(&w, &state.config.base_domain),
            }))
        }
        "CreateGameServer" => {
            let req: CreateGameServerRequest = parse_body(body)?;
            Ok(json_response(&create_game_server(state, ctx, req).await?))
        }
        "DeleteGameServer" => {
            let req: GetGameServerRequest = parse_body(body)?;
            state.lifecycle.delete_workload(ctx, &WorkloadId::new(req.game_server_id)).await?;
            Ok(json_response(&serde_json::json!({})))
        }
        "StartGameServer" => {
            let req: GetGameServerRequest = parse_body(body)?;
            state.lifecycle.start(ctx, &WorkloadId::new(req.game_server_id)).await?;
            Ok(json_response(&serde_json::json!({})))
        }
        "StopGameServer" => {
            let req: GetGameServerRequest = parse_body(body)?;
            state.lifecycle.stop(ctx, &WorkloadId::new(req.game_server_id)).await?;
            Ok(json_response(&serde_json::json!({})))
        }
        "RestartGameServer" => {
            let req: GetGameServerRequest = parse_body(body)?;
            state.lifecycle.restart(ctx, &WorkloadId::new(req.game_server_id)).await?;
            Ok(json_response(&serde_json::json!({})))
        }
        "ListGameServerContainers" => {
            let id = workload_id_from_body(body)
                .ok_or_else(|| Status::invalid_argument("gameServerId is required"))?;
            let w = load_workload(
                state,
                ctx,
                id.as_str(),
                WorkloadKind::GameServer,
                Permission::View,
            )
            .await?;
            let locations = state.lifecycle.registry().validate_and_refresh(&w.id).await?;
            spawn_status_sync(state, w.id.clone());
            Ok(json_response(&ListContainersResponse {
                containers: locations.iter().map(ContainerView::from).collect(),
            }))
        }
        "StartContainer" | "StopContainer" | "RestartContainer" => {
            container_op(state, ctx, meta, method, body).await
        }
        "StreamContainerLogs" | "StreamGameServerLogs" => {
            super::streams::stream_workload_logs(state, ctx, meta, "gameservers", method, body)
                .await
        }
        "StreamBuildLogs" => {
            super::streams::stream_build_logs(state, ctx, "gameservers", body).await
        }
        "StreamLiveMetrics" | "StreamGameServerMetrics" => {
            super::streams::stream_live_metrics(
                state,
                ctx,
                meta,
                "gameservers",
                body,
                ResourceType::Gameserver,
            )
            .await
        }
        "StreamGameServerStatus" => {
            super::streams::stream_game_server_status(state, ctx, body).await
        }
        "ListMinecraftProjects" => {
            let req: ListMinecraftProjectsRequest = parse_body(body)?;
            load_workload(
                state,
                ctx,
                &req.game_server_id,
                WorkloadKind::GameServer,
                Permission::View,
            )
            .await?;
            let (projects, total) = state
                .catalog
                .search(&req.query, req.project_type.as_deref(), req.page.unwrap_or(0))
                .await?;
            Ok(json_response(&ListMinecraftProjectsResponse { projects, total }))
        }
        "InstallMinecraftProjectFile" => {
            let req: InstallMinecraftProjectFileRequest = parse_body(body)?;
            Ok(json_response(&install_project_file(state, ctx, req).await?))
        }
        "GetMinecraftPlayerUUID" => {
            let req: GetMinecraftPlayerUuidRequest = parse_body(body)?;
            let uuid = state.players.uuid_for_name(&req.player_name).await?;
            Ok(json_response(&GetMinecraftPlayerUuidResponse {
                player_name: req.player_name,
                uuid,
            }))
        }
        "GetMinecraftPlayerProfile" => {
            let req: GetMinecraftPlayerProfileRequest = parse_body(body)?;
            let (player_name, skin_url) = state.players.profile(&req.uuid).await?;
            Ok(json_response(&GetMinecraftPlayerProfileResponse {
                uuid: req.uuid,
                player_name,
                skin_url,
            }))
        }
        "ChunkUploadGameServerFiles" => {
            let req: ChunkUploadRequest = parse_body(body)?;
            Ok(json_response(&chunk_upload(state, ctx, req).await?))
        }
        "ListContainerFiles" | "GetContainerFile" | "SearchContainerFiles"
        | "UploadContainerFiles" | "WriteContainerFile" | "DeleteContainerEntries"
        | "CreateContainerEntry" | "RenameContainerEntry" | "ExtractGameServerFile"
        | "CreateGameServerFileArchive" => {
            super::files::dispatch(state, ctx, meta, "gameservers", method, body).await
        }
        other => Ok(unknown_method("gameservers", other)),
    }
}

async fn list_game_servers(
    state: &AppState,
    ctx: &CallContext,
    req: ListGameServersRequest,
) -> Result<ListGameServersResponse, Status> {
    let org = OrgId::new(req.organization_id);
    let scoped =
        sv_core::ScopedPermission::new(Permission::View, ResourceType::Gameserver);
    state.rt.check_permission(ctx, &org, &scoped).await?;
    let workloads = state.rt.workloads.get_all(Some(&org), false).await?;
    Ok(ListGameServersResponse {
        game_servers: workloads
            .iter()
            .filter(|w| w.kind == WorkloadKind::GameServer)
            .map(|w| WorkloadView::from_record(w, &state.config.base_domain))
            .collect(),
    })
}

async fn create_game_server(
    state: &AppState,
    ctx: &CallContext,
    req: CreateGameServerRequest,
) -> Result<CreateGameServerResponse, Status> {
    let org = OrgId::new(req.organization_id);
    let workload = state
        .lifecycle
        .create_workload(
            ctx,
            &org,
            WorkloadKind::GameServer,
            NewWorkload {
                name: req.name,
                image: Some(req.image),
                compose_yaml: None,
                envelope: Some(sv_core::ResourceEnvelope {
                    replicas: 1,
                    memory_bytes: req.memory_bytes,
                    cpu_shares: req.cpu_shares,
                    port: req.port,
                }),
            },
        )
        .await?;
    Ok(CreateGameServerResponse {
        game_server: WorkloadView::from_record(&workload, &state.config.base_domain),
    })
}

async fn container_op(
    state: &AppState,
    ctx: &CallContext,
    meta: &RequestMeta,
    method: &str,
    body: &Bytes,
) -> Result<Response, Status> {
    let req: ContainerOpRequest = parse_body(body)?;
    let w = load_workload(state, ctx, &req.workload_id, WorkloadKind::GameServer, Permission::View)
        .await?;

    let method_path = format!("/rpc/gameservers/{method}");
    if let Some(bytes) = super::maybe_forward_unary(
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
        return Ok(super::passthrough_response(bytes));
    }

    let container = req.container_id.as_deref();
    let service = req.service_name.as_deref();
    match method {
        "StartContainer" => {
            state.lifecycle.start_container(ctx, &w.id, container, service).await?
        }
        "StopContainer" => state.lifecycle.stop_container(ctx, &w.id, container, service).await?,
        "RestartContainer" => {
            state.lifecycle.restart_container(ctx, &w.id, container, service).await?
        }
        other => return Err(Status::unimplemented(format!("unknown container op {other}"))),
    };
    spawn_status_sync(state, w.id.clone());
    Ok(json_response(&ContainerOpResponse::default()))
}

/// Fetch a catalog file and drop it into the server's volume.
async fn install_project_file(
    state: &AppState,
    ctx: &CallContext,
    req: InstallMinecraftProjectFileRequest,
) -> Result<InstallMinecraftProjectFileResponse, Status> {
    let w = load_workload(
        state,
        ctx,
        &req.game_server_id,
        WorkloadKind::GameServer,
        Permission::Update,
    )
    .await?;
    let (file_name, bytes) = state.catalog.fetch_file(&req.project_id, &req.version_id).await?;
    let target = state
        .gateway
        .resolve_backend(&w.id, FileBackend::Volume, None, None, None)
        .await?;
    let path = format!("{}/{}", req.destination_path.trim_end_matches('/'), file_name);
    let size_bytes = bytes.len() as u64;
    state.gateway.write(&target, &path, &bytes, true, None, true).await?;
    Ok(InstallMinecraftProjectFileResponse { file_name, size_bytes })
}

/// One chunk of a chunked upload; the final chunk assembles and delivers
/// the file.
async fn chunk_upload(
    state: &AppState,
    ctx: &CallContext,
    req: ChunkUploadRequest,
) -> Result<ChunkUploadResponse, Status> {
    let w = load_workload(
        state,
        ctx,
        &req.game_server_id,
        WorkloadKind::GameServer,
        Permission::Update,
    )
    .await?;

    let payload = &req.payload;
    let info = match state.rt.chunks.store_chunk(w.id.as_str(), payload) {
        Ok(info) => info,
        Err(e) => {
            return Ok(ChunkUploadResponse {
                success: false,
                error: Some(e.message),
                bytes_received: 0,
                complete: false,
            })
        }
    };

    if !state.rt.chunks.is_complete(w.id.as_str(), &payload.file_name, payload.total_chunks) {
        return Ok(ChunkUploadResponse {
            success: true,
            error: None,
            bytes_received: info.bytes_received,
            complete: false,
        });
    }

    // Last chunk: assemble and deliver, then drop the session.
    let assembled =
        match state.rt.chunks.assemble(w.id.as_str(), &payload.file_name, payload.total_chunks) {
            Ok(bytes) => bytes,
            Err(e) => {
                // Assembly failures are auditable; the session stays so the
                // client can re-send the bad chunk.
                emit_audit(
                    state,
                    ctx,
                    Some(w.org_id.to_string()),
                    "gameservers",
                    "ChunkUploadAssemble",
                    w.id.as_str(),
                    Some(payload.file_name.clone()),
                    Some(&e),
                    Instant::now(),
                );
                return Ok(ChunkUploadResponse {
                    success: false,
                    error: Some(e.message),
                    bytes_received: info.bytes_received,
                    complete: false,
                });
            }
        };

    let backend =
        if payload.volume_name.is_some() { FileBackend::Volume } else { FileBackend::Container };
    let target = state
        .gateway
        .resolve_backend(&w.id, backend, payload.volume_name.as_deref(), None, None)
        .await?;
    let path = format!(
        "{}/{}",
        payload.destination_path.trim_end_matches('/'),
        payload.file_name
    );
    state.gateway.write(&target, &path, &assembled, true, payload.file_mode, true).await?;
    state.rt.chunks.remove(w.id.as_str(), &payload.file_name);

    Ok(ChunkUploadResponse {
        success: true,
        error: None,
        bytes_received: info.bytes_received,
        complete: true,
    })
}

#[cfg(test)]
#[path = "gameservers_tests.rs"]
mod tests;
