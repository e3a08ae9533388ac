// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File surface payloads shared by both services.

use serde::{Deserialize, Serialize};

/// Which backend a file operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileBackend {
    /// Inside the running container's filesystem.
    #[default]
    Container,
    /// Host-side volume directory; works while the container is stopped.
    Volume,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub size_bytes: u64,
    #[serde(default)]
    pub mode: Option<u32>,
    #[serde(default)]
    pub modified_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesRequest {
    pub organization_id: String,
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    pub path: String,
    #[serde(default)]
    pub backend: FileBackend,
    #[serde(default)]
    pub volume_name: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
    /// Numeric cursor: index of the first entry to return.
    #[serde(default)]
    pub cursor: Option<u64>,
    /// 0 (or absent) returns everything.
    #[serde(default)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesResponse {
    /// Path after normalization; `/etc/..` lists as `/`.
    pub current_path: String,
    pub entries: Vec<FileEntry>,
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFileRequest {
    pub organization_id: String,
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    pub path: String,
    #[serde(default)]
    pub backend: FileBackend,
    #[serde(default)]
    pub volume_name: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFileResponse {
    pub path: String,
    /// UTF-8 text, or base64 when `encoding == "base64"`.
    pub content: String,
    pub encoding: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFileRequest {
    pub organization_id: String,
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub backend: FileBackend,
    #[serde(default)]
    pub volume_name: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub create_if_missing: bool,
    #[serde(default)]
    pub mode: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteFileResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFilesRequest {
    pub organization_id: String,
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    pub destination_path: String,
    /// Tar stream, base64 on the JSON surface.
    pub tar_base64: String,
    #[serde(default)]
    pub backend: FileBackend,
    #[serde(default)]
    pub volume_name: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadFilesResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEntriesRequest {
    pub organization_id: String,
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    pub paths: Vec<String>,
    #[serde(default)]
    pub backend: FileBackend,
    #[serde(default)]
    pub volume_name: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteEntriesResponse {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateEntryKind {
    File,
    Directory,
    Symlink,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryRequest {
    pub organization_id: String,
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    pub path: String,
    pub kind: CreateEntryKind,
    /// Symlink target; required for `kind == Symlink`.
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub backend: FileBackend,
    #[serde(default)]
    pub volume_name: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateEntryResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameEntryRequest {
    pub organization_id: String,
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    pub from_path: String,
    pub to_path: String,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub backend: FileBackend,
    #[serde(default)]
    pub volume_name: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenameEntryResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchByNameRequest {
    pub organization_id: String,
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    pub path: String,
    pub query: String,
    #[serde(default)]
    pub backend: FileBackend,
    #[serde(default)]
    pub volume_name: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchByNameResponse {
    pub entries: Vec<FileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArchiveRequest {
    pub organization_id: String,
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    pub source_paths: Vec<String>,
    pub destination_path: String,
    #[serde(default)]
    pub include_parent_folder: bool,
    #[serde(default)]
    pub backend: FileBackend,
    #[serde(default)]
    pub volume_name: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArchiveResponse {
    pub archive_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractFileRequest {
    pub organization_id: String,
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    pub archive_path: String,
    pub destination_path: String,
    #[serde(default)]
    pub backend: FileBackend,
    #[serde(default)]
    pub volume_name: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractFileResponse {}

/// Consolidated chunked-upload payload carried by both the RPC method and
/// the HTTP upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedUploadPayload {
    pub file_name: String,
    pub file_size: u64,
    pub total_chunks: u32,
    pub chunk_index: u32,
    /// Raw chunk bytes, base64 on the JSON surface.
    #[serde(with = "chunk_bytes")]
    pub chunk_data: Vec<u8>,
    #[serde(default)]
    pub volume_name: Option<String>,
    pub destination_path: String,
    #[serde(default)]
    pub file_mode: Option<u32>,
}

mod chunk_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "files_tests.rs"]
mod tests;
