// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive codecs shared by both gateway backends: zip for user-facing
//! archives, tar for the engine copy protocol.

use std::io::{Cursor, Read, Write};
use std::path::PathBuf;

use sv_core::Status;

/// One file going into or coming out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Slash-separated relative path inside the archive.
    pub path: String,
    pub data: Vec<u8>,
    pub is_dir: bool,
    pub mode: Option<u32>,
}

impl ArchiveEntry {
    pub fn file(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self { path: path.into(), data, is_dir: false, mode: None }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self { path: path.into(), data: Vec::new(), is_dir: true, mode: None }
    }
}

/// Build a zip archive from entries.
pub fn build_zip(entries: &[ArchiveEntry]) -> Result<Vec<u8>, Status> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for entry in entries {
        if entry.is_dir {
            writer
                .add_directory(entry.path.trim_end_matches('/'), options)
                .map_err(|e| Status::internal(format!("zip directory: {e}")))?;
        } else {
            let opts = match entry.mode {
                Some(mode) => options.unix_permissions(mode),
                None => options,
            };
            writer
                .start_file(entry.path.as_str(), opts)
                .map_err(|e| Status::internal(format!("zip entry {}: {e}", entry.path)))?;
            writer
                .write_all(&entry.data)
                .map_err(|e| Status::internal(format!("zip write {}: {e}", entry.path)))?;
        }
    }
    let cursor =
        writer.finish().map_err(|e| Status::internal(format!("zip finalize: {e}")))?;
    Ok(cursor.into_inner())
}

/// Read a zip archive into entries. Paths are sanitized; entries that
/// escape the archive root are rejected.
pub fn read_zip(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, Status> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Status::invalid_argument(format!("not a zip archive: {e}")))?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| Status::invalid_argument(format!("zip entry {index}: {e}")))?;
        let Some(path) = file.enclosed_name() else {
            return Err(Status::invalid_argument(format!(
                "zip entry {:?} escapes the archive root",
                file.name()
            )));
        };
        let path = path.to_string_lossy().replace('\\', "/");
        if file.is_dir() {
            entries.push(ArchiveEntry::dir(path));
        } else {
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| Status::internal(format!("zip read {path}: {e}")))?;
            let mode = file.unix_mode();
            entries.push(ArchiveEntry { path, data, is_dir: false, mode });
        }
    }
    Ok(entries)
}

/// Build a tar stream for the engine copy protocol.
pub fn build_tar(entries: &[ArchiveEntry]) -> Result<Vec<u8>, Status> {
    let mut builder = tar::Builder::new(Vec::new());
    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_mode(entry.mode.unwrap_or(if entry.is_dir { 0o755 } else { 0o644 }));
        header.set_mtime(0);
        if entry.is_dir {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            let path = format!("{}/", entry.path.trim_end_matches('/'));
            builder
                .append_data(&mut header, path, std::io::empty())
                .map_err(|e| Status::internal(format!("tar dir {}: {e}", entry.path)))?;
        } else {
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(entry.data.len() as u64);
            builder
                .append_data(&mut header, entry.path.as_str(), entry.data.as_slice())
                .map_err(|e| Status::internal(format!("tar entry {}: {e}", entry.path)))?;
        }
    }
    builder.into_inner().map_err(|e| Status::internal(format!("tar finalize: {e}")))
}

/// Read a tar stream into entries. Non-file, non-directory entries
/// (links, devices) are skipped.
pub fn read_tar(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, Status> {
    let mut archive = tar::Archive::new(Cursor::new(bytes));
    let mut out = Vec::new();
    let entries =
        archive.entries().map_err(|e| Status::invalid_argument(format!("not a tar: {e}")))?;
    for entry in entries {
        let mut entry =
            entry.map_err(|e| Status::invalid_argument(format!("tar entry: {e}")))?;
        let path: PathBuf = entry
            .path()
            .map_err(|e| Status::invalid_argument(format!("tar path: {e}")))?
            .into_owned();
        let path = path.to_string_lossy().trim_end_matches('/').to_string();
        if path.is_empty() {
            continue;
        }
        let mode = entry.header().mode().ok();
        match entry.header().entry_type() {
            tar::EntryType::Directory => out.push(ArchiveEntry {
                path,
                data: Vec::new(),
                is_dir: true,
                mode,
            }),
            tar::EntryType::Regular | tar::EntryType::GNUSparse => {
                let mut data = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut data)
                    .map_err(|e| Status::internal(format!("tar read {path}: {e}")))?;
                out.push(ArchiveEntry { path, data, is_dir: false, mode });
            }
            _ => {}
        }
    }
    Ok(out)
}

/// Expand `.zip` members of an upload in place.
///
/// Regular entries named `*.zip` are replaced by their contents; names at
/// the zip root land under a folder named after the zip's stem. A zip
/// that fails to parse is kept as the original file.
pub fn expand_zip_members(entries: Vec<ArchiveEntry>) -> Vec<ArchiveEntry> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let is_zip = !entry.is_dir && entry.path.to_ascii_lowercase().ends_with(".zip");
        if !is_zip {
            out.push(entry);
            continue;
        }
        match read_zip(&entry.data) {
            Ok(inner) => {
                let stem = zip_stem(&entry.path);
                let parent = match entry.path.rsplit_once('/') {
                    Some((dir, _)) => format!("{dir}/"),
                    None => String::new(),
                };
                for mut member in inner {
                    member.path = if member.path.contains('/') {
                        format!("{parent}{}", member.path)
                    } else {
                        format!("{parent}{stem}/{}", member.path)
                    };
                    out.push(member);
                }
            }
            Err(_) => out.push(entry),
        }
    }
    out
}

fn zip_stem(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    base.strip_suffix(".zip").or_else(|| base.strip_suffix(".ZIP")).unwrap_or(base).to_string()
}

/// Derive the final archive path: keep a `.zip` destination, otherwise
/// name the archive after the first source (or the directory) inside it.
pub fn derive_archive_destination(destination: &str, sources: &[String]) -> String {
    if destination.to_ascii_lowercase().ends_with(".zip") {
        return destination.to_string();
    }
    let stem = sources
        .first()
        .and_then(|s| s.trim_end_matches('/').rsplit('/').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("archive");
    format!("{}/{stem}.zip", destination.trim_end_matches('/'))
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
