// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Game server service payloads.
//!
//! The surface mirrors the deployments service; only the additions live
//! here (status streaming, the Minecraft catalog, chunked uploads).

use serde::{Deserialize, Serialize};

use crate::files::ChunkedUploadPayload;
use crate::types::WorkloadView;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGameServersRequest {
    pub organization_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGameServersResponse {
    pub game_servers: Vec<WorkloadView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetGameServerRequest {
    pub organization_id: String,
    pub game_server_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetGameServerResponse {
    pub game_server: WorkloadView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameServerRequest {
    pub organization_id: String,
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub memory_bytes: Option<u64>,
    #[serde(default)]
    pub cpu_shares: Option<u32>,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameServerResponse {
    pub game_server: WorkloadView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamGameServerStatusRequest {
    pub organization_id: String,
    pub game_server_id: String,
}

/// Catalog search against the external mod/plugin index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMinecraftProjectsRequest {
    pub organization_id: String,
    pub game_server_id: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinecraftProject {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub project_type: String,
    pub downloads: u64,
    #[serde(default)]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMinecraftProjectsResponse {
    pub projects: Vec<MinecraftProject>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallMinecraftProjectFileRequest {
    pub organization_id: String,
    pub game_server_id: String,
    pub project_id: String,
    pub version_id: String,
    /// Where the fetched file lands inside the server volume.
    pub destination_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallMinecraftProjectFileResponse {
    pub file_name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMinecraftPlayerUuidRequest {
    pub player_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMinecraftPlayerUuidResponse {
    pub player_name: String,
    pub uuid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMinecraftPlayerProfileRequest {
    pub uuid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMinecraftPlayerProfileResponse {
    pub uuid: String,
    pub player_name: String,
    #[serde(default)]
    pub skin_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadRequest {
    pub organization_id: String,
    pub game_server_id: String,
    #[serde(flatten)]
    pub payload: ChunkedUploadPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub bytes_received: u64,
    pub complete: bool,
}
