// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem gateway.
//!
//! Two backends per workload: the running container's filesystem (exec +
//! tar copy through the engine facade) and the host-side volume directory
//! (works while the container is stopped). Every requested path is
//! normalized and, for volumes, confined to the volume root.

pub mod archive;

pub use archive::ArchiveEntry;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sv_adapters::engine::ContainerEngine;
use sv_adapters::pathsafe::normalize_path;
use sv_adapters::volumes::VolumeFs;
use sv_core::{ContainerId, Status, WorkloadId};
use sv_wire::files::{FileBackend, FileEntry};

use crate::locations::LocationRegistry;

/// Resolved operation target.
#[derive(Debug)]
pub enum BackendTarget {
    Container(ContainerId),
    Volume(VolumeFs),
}

/// A page of directory entries.
#[derive(Debug, Clone)]
pub struct ListPage {
    pub current_path: String,
    pub entries: Vec<FileEntry>,
    pub has_more: bool,
    pub next_cursor: Option<u64>,
}

/// File content plus its transfer encoding.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub path: String,
    pub content: String,
    pub encoding: String,
    pub size_bytes: u64,
}

#[derive(Clone)]
pub struct FilesGateway {
    engine: Arc<dyn ContainerEngine>,
    registry: LocationRegistry,
}

impl FilesGateway {
    pub fn new(engine: Arc<dyn ContainerEngine>, registry: LocationRegistry) -> Self {
        Self { engine, registry }
    }

    /// Resolve the workload + backend selection to a concrete target.
    ///
    /// Container backends require a running container; volume backends
    /// work against the host path of a (named or anonymous) volume even
    /// when the container is stopped.
    pub async fn resolve_backend(
        &self,
        workload: &WorkloadId,
        backend: FileBackend,
        volume_name: Option<&str>,
        container_id: Option<&str>,
        service_name: Option<&str>,
    ) -> Result<BackendTarget, Status> {
        let location = self.registry.find(workload, container_id, service_name, true).await?;
        match backend {
            FileBackend::Container => {
                let state = self.engine.inspect(&location.container_id).await?;
                if !state.running {
                    return Err(Status::failed_precondition(format!(
                        "container {} is not running",
                        location.container_id.short(12)
                    )));
                }
                Ok(BackendTarget::Container(location.container_id))
            }
            FileBackend::Volume => {
                let mounts = self.engine.container_volumes(&location.container_id).await?;
                let mount = match volume_name {
                    Some(name) => mounts.iter().find(|m| m.name.as_deref() == Some(name)),
                    None => mounts
                        .iter()
                        .find(|m| m.is_named)
                        .or_else(|| mounts.iter().find(|m| m.source_host_path.is_some())),
                };
                let mount = mount.ok_or_else(|| {
                    Status::not_found(match volume_name {
                        Some(name) => format!("volume {name} not found"),
                        None => "workload has no volumes".to_string(),
                    })
                })?;
                let root = mount
                    .source_host_path
                    .clone()
                    .ok_or_else(|| Status::internal("volume has no host source path"))?;
                Ok(BackendTarget::Volume(VolumeFs::new(root)))
            }
        }
    }

    // --- list / get ---

    pub async fn list(
        &self,
        target: &BackendTarget,
        path: &str,
        cursor: Option<u64>,
        page_size: Option<u32>,
    ) -> Result<ListPage, Status> {
        let current_path = normalize_path(path).map_err(|e| Status::invalid_argument(e.to_string()))?;
        let entries = match target {
            BackendTarget::Volume(vol) => vol
                .list(&current_path)
                .map_err(Status::from)?
                .into_iter()
                .map(volume_entry_to_wire)
                .collect(),
            BackendTarget::Container(container) => {
                self.list_container(container, &current_path).await?
            }
        };
        let (entries, has_more, next_cursor) = page_entries(entries, cursor, page_size);
        Ok(ListPage { current_path, entries, has_more, next_cursor })
    }

    async fn list_container(
        &self,
        container: &ContainerId,
        path: &str,
    ) -> Result<Vec<FileEntry>, Status> {
        let argv = vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            format!("ls -1Ap -- {}", shell_quote(path)),
        ];
        let output = self.engine.exec(container, &argv).await?;
        if output.exit_code != 0 {
            let stderr = output.stderr_utf8();
            return Err(classify_shell_error(&stderr, path));
        }
        let base = if path == "/" { String::new() } else { path.to_string() };
        let mut entries: Vec<FileEntry> = output
            .stdout_utf8()
            .lines()
            .filter(|l| !l.is_empty())
            .map(|line| {
                let is_dir = line.ends_with('/');
                let name = line.trim_end_matches('/').to_string();
                FileEntry {
                    path: format!("{base}/{name}"),
                    name,
                    is_dir,
                    is_symlink: false,
                    size_bytes: 0,
                    mode: None,
                    modified_at: None,
                }
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Read a file; UTF-8 comes back as text, anything else as base64.
    pub async fn get(&self, target: &BackendTarget, path: &str) -> Result<FileContent, Status> {
        let normalized = normalize_path(path).map_err(|e| Status::invalid_argument(e.to_string()))?;
        let bytes = self.read_bytes(target, &normalized).await?;
        let size_bytes = bytes.len() as u64;
        let (content, encoding) = match String::from_utf8(bytes) {
            Ok(text) => (text, "utf-8".to_string()),
            Err(err) => (BASE64.encode(err.as_bytes()), "base64".to_string()),
        };
        Ok(FileContent { path: normalized, content, encoding, size_bytes })
    }

    async fn read_bytes(&self, target: &BackendTarget, path: &str) -> Result<Vec<u8>, Status> {
        match target {
            BackendTarget::Volume(vol) => Ok(vol.read(path).map_err(Status::from)?),
            BackendTarget::Container(container) => {
                let tar_bytes = self.engine.copy_from(container, path).await?;
                let entries = archive::read_tar(&tar_bytes)?;
                entries
                    .into_iter()
                    .find(|e| !e.is_dir)
                    .map(|e| e.data)
                    .ok_or_else(|| Status::not_found(format!("{path} is not a file")))
            }
        }
    }

    // --- write / upload ---

    /// Write one file. `server.properties` gets its restricted keys
    /// stripped before persisting.
    #[allow(clippy::too_many_arguments)]
    pub async fn write(
        &self,
        target: &BackendTarget,
        path: &str,
        content: &[u8],
        create_if_missing: bool,
        mode: Option<u32>,
        game_server_context: bool,
    ) -> Result<(), Status> {
        let normalized = normalize_path(path).map_err(|e| Status::invalid_argument(e.to_string()))?;
        let filtered;
        let content = if game_server_context && normalized.ends_with("/server.properties") {
            filtered = filter_server_properties(&String::from_utf8_lossy(content));
            filtered.as_bytes()
        } else {
            content
        };

        match target {
            BackendTarget::Volume(vol) => {
                Ok(vol.write(&normalized, content, create_if_missing, mode).map_err(Status::from)?)
            }
            BackendTarget::Container(container) => {
                if !create_if_missing {
                    // Existence probe; the tar upload would create it.
                    self.read_bytes(target, &normalized).await.map_err(|e| {
                        if e.code == sv_core::ErrorCode::NotFound {
                            Status::not_found(format!("{normalized} does not exist"))
                        } else {
                            e
                        }
                    })?;
                }
                let (dir, name) = split_parent(&normalized)?;
                let tar_bytes = archive::build_tar(&[ArchiveEntry {
                    path: name.to_string(),
                    data: content.to_vec(),
                    is_dir: false,
                    mode,
                }])?;
                Ok(self.engine.copy_to(container, &dir, tar_bytes).await?)
            }
        }
    }

    /// Upload a tar stream into a destination directory. Zip members are
    /// expanded in place; a zip that cannot be parsed is stored verbatim.
    pub async fn upload(
        &self,
        target: &BackendTarget,
        destination: &str,
        tar_bytes: Vec<u8>,
    ) -> Result<(), Status> {
        let destination =
            normalize_path(destination).map_err(|e| Status::invalid_argument(e.to_string()))?;
        let entries = archive::expand_zip_members(archive::read_tar(&tar_bytes)?);
        match target {
            BackendTarget::Container(container) => {
                let repacked = archive::build_tar(&entries)?;
                Ok(self.engine.copy_to(container, &destination, repacked).await?)
            }
            BackendTarget::Volume(vol) => {
                for entry in entries {
                    let dest = format!("{}/{}", destination.trim_end_matches('/'), entry.path);
                    if entry.is_dir {
                        match vol.create_dir(&dest) {
                            Ok(()) => {}
                            Err(sv_adapters::volumes::VolumeFsError::AlreadyExists(_)) => {}
                            Err(e) => return Err(e.into()),
                        }
                    } else {
                        vol.write(&dest, &entry.data, true, entry.mode).map_err(Status::from)?;
                    }
                }
                Ok(())
            }
        }
    }

    // --- delete / create / rename / search ---

    pub async fn delete(
        &self,
        target: &BackendTarget,
        paths: &[String],
        recursive: bool,
        force: bool,
    ) -> Result<(), Status> {
        for path in paths {
            let normalized =
                normalize_path(path).map_err(|e| Status::invalid_argument(e.to_string()))?;
            match target {
                BackendTarget::Volume(vol) => {
                    vol.delete(&normalized, recursive, force).map_err(Status::from)?
                }
                BackendTarget::Container(container) => {
                    // Directory deletes demand recursive=true; probe first.
                    if !recursive {
                        let probe = vec![
                            "/bin/sh".to_string(),
                            "-c".to_string(),
                            format!("test -d {}", shell_quote(&normalized)),
                        ];
                        let output = self.engine.exec(container, &probe).await?;
                        if output.exit_code == 0 {
                            return Err(Status::failed_precondition(format!(
                                "{normalized} is a directory; pass recursive=true"
                            )));
                        }
                    }
                    let mut flags = String::from("-");
                    if recursive {
                        flags.push('r');
                    }
                    if force {
                        flags.push('f');
                    }
                    let argv = vec![
                        "/bin/sh".to_string(),
                        "-c".to_string(),
                        format!("rm {flags} -- {}", shell_quote(&normalized)),
                    ];
                    let output = self.engine.exec(container, &argv).await?;
                    if output.exit_code != 0 && !force {
                        return Err(classify_shell_error(&output.stderr_utf8(), &normalized));
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn create_entry(
        &self,
        target: &BackendTarget,
        path: &str,
        kind: sv_wire::files::CreateEntryKind,
        template: Option<&str>,
    ) -> Result<(), Status> {
        use sv_wire::files::CreateEntryKind;
        let normalized = normalize_path(path).map_err(|e| Status::invalid_argument(e.to_string()))?;
        if kind == CreateEntryKind::Symlink && template.map(str::trim).unwrap_or("").is_empty() {
            return Err(Status::invalid_argument("symlink creation requires a target template"));
        }
        match target {
            BackendTarget::Volume(vol) => match kind {
                CreateEntryKind::File => Ok(vol.create_file(&normalized).map_err(Status::from)?),
                CreateEntryKind::Directory => Ok(vol.create_dir(&normalized).map_err(Status::from)?),
                CreateEntryKind::Symlink => {
                    #[cfg(unix)]
                    {
                        Ok(vol
                            .create_symlink(&normalized, template.unwrap_or_default())
                            .map_err(Status::from)?)
                    }
                    #[cfg(not(unix))]
                    Err(Status::unimplemented("symlinks are not supported on this platform"))
                }
            },
            BackendTarget::Container(container) => {
                let command = match kind {
                    CreateEntryKind::File => format!("touch -- {}", shell_quote(&normalized)),
                    CreateEntryKind::Directory => {
                        format!("mkdir -p -- {}", shell_quote(&normalized))
                    }
                    CreateEntryKind::Symlink => format!(
                        "ln -s -- {} {}",
                        shell_quote(template.unwrap_or_default()),
                        shell_quote(&normalized)
                    ),
                };
                let argv = vec!["/bin/sh".to_string(), "-c".to_string(), command];
                let output = self.engine.exec(container, &argv).await?;
                if output.exit_code != 0 {
                    return Err(classify_shell_error(&output.stderr_utf8(), &normalized));
                }
                Ok(())
            }
        }
    }

    pub async fn rename(
        &self,
        target: &BackendTarget,
        from: &str,
        to: &str,
        overwrite: bool,
    ) -> Result<(), Status> {
        let from = normalize_path(from).map_err(|e| Status::invalid_argument(e.to_string()))?;
        let to = normalize_path(to).map_err(|e| Status::invalid_argument(e.to_string()))?;
        match target {
            BackendTarget::Volume(vol) => {
                Ok(vol.rename(&from, &to, overwrite).map_err(Status::from)?)
            }
            BackendTarget::Container(container) => {
                let guard = if overwrite {
                    String::new()
                } else {
                    format!("test -e {} && exit 17; ", shell_quote(&to))
                };
                let command =
                    format!("{guard}mv -- {} {}", shell_quote(&from), shell_quote(&to));
                let argv = vec!["/bin/sh".to_string(), "-c".to_string(), command];
                let output = self.engine.exec(container, &argv).await?;
                match output.exit_code {
                    0 => Ok(()),
                    17 => Err(Status::failed_precondition(format!(
                        "{to} already exists; pass overwrite=true"
                    ))),
                    _ => Err(classify_shell_error(&output.stderr_utf8(), &from)),
                }
            }
        }
    }

    pub async fn search(
        &self,
        target: &BackendTarget,
        path: &str,
        query: &str,
    ) -> Result<Vec<FileEntry>, Status> {
        if query.trim().is_empty() {
            return Err(Status::invalid_argument("search query is empty"));
        }
        let normalized = normalize_path(path).map_err(|e| Status::invalid_argument(e.to_string()))?;
        match target {
            BackendTarget::Volume(vol) => Ok(vol
                .search(&normalized, query)
                .map_err(Status::from)?
                .into_iter()
                .map(volume_entry_to_wire)
                .collect()),
            BackendTarget::Container(container) => {
                let command = format!(
                    "find {} -iname {} 2>/dev/null",
                    shell_quote(&normalized),
                    shell_quote(&format!("*{query}*"))
                );
                let argv = vec!["/bin/sh".to_string(), "-c".to_string(), command];
                let output = self.engine.exec(container, &argv).await?;
                Ok(output
                    .stdout_utf8()
                    .lines()
                    .filter(|l| !l.is_empty())
                    .map(|line| FileEntry {
                        name: line.rsplit('/').next().unwrap_or(line).to_string(),
                        path: line.to_string(),
                        is_dir: false,
                        is_symlink: false,
                        size_bytes: 0,
                        mode: None,
                        modified_at: None,
                    })
                    .collect())
            }
        }
    }

    // --- archive / extract ---

    /// Zip the union of sources into `destination`; returns the archive
    /// path actually written.
    pub async fn archive(
        &self,
        target: &BackendTarget,
        sources: &[String],
        destination: &str,
        include_parent_folder: bool,
    ) -> Result<String, Status> {
        if sources.is_empty() {
            return Err(Status::invalid_argument("no archive sources given"));
        }
        let destination = archive::derive_archive_destination(
            &normalize_path(destination).map_err(|e| Status::invalid_argument(e.to_string()))?,
            sources,
        );

        let mut zip_entries: Vec<ArchiveEntry> = Vec::new();
        for source in sources {
            let source =
                normalize_path(source).map_err(|e| Status::invalid_argument(e.to_string()))?;
            let collected = self.collect_tree(target, &source).await?;
            let base = archive_base(&source, include_parent_folder);
            for mut entry in collected {
                if !base.is_empty() {
                    entry.path = format!("{base}/{}", entry.path);
                }
                zip_entries.push(entry);
            }
        }
        let zip_bytes = archive::build_zip(&zip_entries)?;
        self.write(target, &destination, &zip_bytes, true, None, false).await?;
        Ok(destination)
    }

    /// Unpack a zip archive into `destination`.
    pub async fn extract(
        &self,
        target: &BackendTarget,
        archive_path: &str,
        destination: &str,
    ) -> Result<(), Status> {
        let normalized =
            normalize_path(archive_path).map_err(|e| Status::invalid_argument(e.to_string()))?;
        let bytes = self.read_bytes(target, &normalized).await?;
        let entries = archive::read_zip(&bytes)?;
        let tar_bytes = archive::build_tar(&entries)?;
        self.upload(target, destination, tar_bytes).await
    }

    /// Collect a file, or a directory tree, as archive entries whose
    /// paths are relative to the source itself.
    async fn collect_tree(
        &self,
        target: &BackendTarget,
        source: &str,
    ) -> Result<Vec<ArchiveEntry>, Status> {
        let name = source.trim_end_matches('/').rsplit('/').next().unwrap_or("").to_string();
        match target {
            BackendTarget::Container(container) => {
                // The engine hands directory trees back as tar already.
                let tar_bytes = self.engine.copy_from(container, source).await?;
                Ok(archive::read_tar(&tar_bytes)?)
            }
            BackendTarget::Volume(vol) => {
                let meta = vol.metadata(source).map_err(Status::from)?;
                if !meta.is_dir {
                    return Ok(vec![ArchiveEntry::file(
                        name,
                        vol.read(source).map_err(Status::from)?,
                    )]);
                }
                let mut out = Vec::new();
                let mut stack = vec![source.to_string()];
                while let Some(dir) = stack.pop() {
                    for entry in vol.list(&dir).map_err(Status::from)? {
                        let rel = format!(
                            "{name}{}",
                            entry.path.strip_prefix(source).unwrap_or(&entry.path)
                        )
                        .trim_start_matches('/')
                        .to_string();
                        if entry.is_dir {
                            out.push(ArchiveEntry::dir(rel));
                            stack.push(entry.path.clone());
                        } else {
                            out.push(ArchiveEntry::file(
                                rel,
                                vol.read(&entry.path).map_err(Status::from)?,
                            ));
                        }
                    }
                }
                Ok(out)
            }
        }
    }
}

// --- pure helpers ---

/// Apply numeric-cursor paging. Page size 0 (or absent) returns
/// everything from the cursor on.
pub fn page_entries(
    entries: Vec<FileEntry>,
    cursor: Option<u64>,
    page_size: Option<u32>,
) -> (Vec<FileEntry>, bool, Option<u64>) {
    let start = cursor.unwrap_or(0) as usize;
    if start >= entries.len() {
        return (Vec::new(), false, None);
    }
    let rest = &entries[start..];
    match page_size {
        Some(size) if size > 0 && (size as usize) < rest.len() => {
            let page = rest[..size as usize].to_vec();
            let next = start as u64 + u64::from(size);
            (page, true, Some(next))
        }
        _ => (rest.to_vec(), false, None),
    }
}

/// Strip keys game servers must not override.
pub fn filter_server_properties(content: &str) -> String {
    const RESTRICTED: &[&str] = &["server-port", "server-ip"];
    let mut out: String = content
        .lines()
        .filter(|line| {
            let key = line.split('=').next().unwrap_or("").trim();
            !RESTRICTED.contains(&key)
        })
        .collect::<Vec<_>>()
        .join("\n");
    if content.ends_with('\n') && !out.is_empty() {
        out.push('\n');
    }
    out
}

/// POSIX single-quote escaping.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn split_parent(path: &str) -> Result<(String, String), Status> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((dir, name)) if !name.is_empty() => {
            let dir = if dir.is_empty() { "/" } else { dir };
            Ok((dir.to_string(), name.to_string()))
        }
        _ => Err(Status::invalid_argument(format!("{path} has no file name"))),
    }
}

fn classify_shell_error(stderr: &str, path: &str) -> Status {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("no such file") || lower.contains("not found") {
        Status::not_found(format!("{path} not found"))
    } else if lower.contains("permission denied") {
        Status::permission_denied(format!("{path}: permission denied"))
    } else {
        Status::internal(format!("{path}: {}", stderr.trim()))
    }
}

fn volume_entry_to_wire(entry: sv_adapters::volumes::VolumeEntry) -> FileEntry {
    FileEntry {
        name: entry.name,
        path: entry.path,
        is_dir: entry.is_dir,
        is_symlink: entry.is_symlink,
        size_bytes: entry.size_bytes,
        mode: entry.mode,
        modified_at: entry.modified_at,
    }
}

/// Base folder for one archive source inside the zip.
fn archive_base(source: &str, include_parent_folder: bool) -> String {
    if !include_parent_folder {
        return String::new();
    }
    source
        .trim_end_matches('/')
        .rsplit('/')
        .nth(1)
        .filter(|s| !s.is_empty())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
