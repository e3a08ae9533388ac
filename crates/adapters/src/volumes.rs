// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-side volume filesystem access.
//!
//! Operates on the source host path of a named or anonymous volume, so
//! file management keeps working while the container is stopped. Every
//! requested path is confined to the volume root via
//! [`crate::pathsafe::resolve_within_root`].

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use sv_core::Status;

use crate::pathsafe::{self, PathError};

#[derive(Debug, Error)]
pub enum VolumeFsError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("{0} is a directory; pass recursive=true")]
    IsDirectory(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<VolumeFsError> for Status {
    fn from(err: VolumeFsError) -> Self {
        match &err {
            VolumeFsError::Path(_) => Status::invalid_argument(err.to_string()),
            VolumeFsError::NotFound(_) => Status::not_found(err.to_string()),
            VolumeFsError::AlreadyExists(_)
            | VolumeFsError::IsDirectory(_)
            | VolumeFsError::NotADirectory(_) => Status::failed_precondition(err.to_string()),
            VolumeFsError::Io(_) => Status::internal(err.to_string()),
        }
    }
}

fn io_err(path: &Path, err: &std::io::Error) -> VolumeFsError {
    match err.kind() {
        std::io::ErrorKind::NotFound => VolumeFsError::NotFound(path.display().to_string()),
        std::io::ErrorKind::AlreadyExists => {
            VolumeFsError::AlreadyExists(path.display().to_string())
        }
        _ => VolumeFsError::Io(format!("{}: {}", path.display(), err)),
    }
}

/// One directory entry, with the client-visible volume-absolute path.
#[derive(Debug, Clone)]
pub struct VolumeEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub size_bytes: u64,
    pub mode: Option<u32>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Filesystem rooted at a volume's host path.
#[derive(Debug, Clone)]
pub struct VolumeFs {
    root: PathBuf,
}

impl VolumeFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Confine a requested path to this volume.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, VolumeFsError> {
        Ok(pathsafe::resolve_within_root(&self.root, requested)?)
    }

    /// Volume-absolute form of a requested path (`/etc/..` → `/`).
    pub fn display_path(&self, requested: &str) -> Result<String, VolumeFsError> {
        Ok(pathsafe::normalize_path(requested)?)
    }

    fn entry(&self, host_path: &Path, display_path: String) -> Result<VolumeEntry, VolumeFsError> {
        let meta = fs::symlink_metadata(host_path).map_err(|e| io_err(host_path, &e))?;
        let name = host_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());
        #[cfg(unix)]
        let mode = {
            use std::os::unix::fs::PermissionsExt;
            Some(meta.permissions().mode() & 0o7777)
        };
        #[cfg(not(unix))]
        let mode = None;
        Ok(VolumeEntry {
            name,
            path: display_path,
            is_dir: meta.is_dir(),
            is_symlink: meta.file_type().is_symlink(),
            size_bytes: if meta.is_file() { meta.len() } else { 0 },
            mode,
            modified_at: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    /// List a directory, sorted by name.
    pub fn list(&self, requested: &str) -> Result<Vec<VolumeEntry>, VolumeFsError> {
        let dir = self.resolve(requested)?;
        let display_base = self.display_path(requested)?;
        let meta = fs::metadata(&dir).map_err(|e| io_err(&dir, &e))?;
        if !meta.is_dir() {
            return Err(VolumeFsError::NotADirectory(display_base));
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| io_err(&dir, &e))? {
            let entry = entry.map_err(|e| io_err(&dir, &e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let display = if display_base == "/" {
                format!("/{name}")
            } else {
                format!("{display_base}/{name}")
            };
            entries.push(self.entry(&entry.path(), display)?);
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    pub fn metadata(&self, requested: &str) -> Result<VolumeEntry, VolumeFsError> {
        let path = self.resolve(requested)?;
        self.entry(&path, self.display_path(requested)?)
    }

    pub fn read(&self, requested: &str) -> Result<Vec<u8>, VolumeFsError> {
        let path = self.resolve(requested)?;
        fs::read(&path).map_err(|e| io_err(&path, &e))
    }

    pub fn write(
        &self,
        requested: &str,
        bytes: &[u8],
        create_if_missing: bool,
        mode: Option<u32>,
    ) -> Result<(), VolumeFsError> {
        let path = self.resolve(requested)?;
        let existed = path.exists();
        if !existed && !create_if_missing {
            return Err(VolumeFsError::NotFound(self.display_path(requested)?));
        }
        #[cfg(unix)]
        let previous_mode = if existed {
            use std::os::unix::fs::PermissionsExt;
            fs::metadata(&path).ok().map(|m| m.permissions().mode() & 0o7777)
        } else {
            None
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, &e))?;
        }
        fs::write(&path, bytes).map_err(|e| io_err(&path, &e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // Explicit mode wins; otherwise an existing file keeps its mode.
            if let Some(m) = mode.or(previous_mode) {
                let _ = fs::set_permissions(&path, fs::Permissions::from_mode(m));
            }
        }
        #[cfg(not(unix))]
        let _ = mode;
        Ok(())
    }

    pub fn delete(&self, requested: &str, recursive: bool, force: bool) -> Result<(), VolumeFsError> {
        let path = self.resolve(requested)?;
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && force => return Ok(()),
            Err(e) => return Err(io_err(&path, &e)),
        };
        let result = if meta.is_dir() {
            if !recursive {
                return Err(VolumeFsError::IsDirectory(self.display_path(requested)?));
            }
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && force => Ok(()),
            Err(e) => Err(io_err(&path, &e)),
        }
    }

    pub fn create_file(&self, requested: &str) -> Result<(), VolumeFsError> {
        let path = self.resolve(requested)?;
        if path.exists() {
            return Err(VolumeFsError::AlreadyExists(self.display_path(requested)?));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, &e))?;
        }
        fs::write(&path, b"").map_err(|e| io_err(&path, &e))
    }

    pub fn create_dir(&self, requested: &str) -> Result<(), VolumeFsError> {
        let path = self.resolve(requested)?;
        if path.exists() {
            return Err(VolumeFsError::AlreadyExists(self.display_path(requested)?));
        }
        fs::create_dir_all(&path).map_err(|e| io_err(&path, &e))
    }

    /// Create a symlink at `requested` pointing at `target`. The target is
    /// volume-relative and confined like every other path.
    #[cfg(unix)]
    pub fn create_symlink(&self, requested: &str, target: &str) -> Result<(), VolumeFsError> {
        let path = self.resolve(requested)?;
        let target_path = self.resolve(target)?;
        if path.exists() {
            return Err(VolumeFsError::AlreadyExists(self.display_path(requested)?));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, &e))?;
        }
        std::os::unix::fs::symlink(&target_path, &path).map_err(|e| io_err(&path, &e))
    }

    pub fn rename(&self, from: &str, to: &str, overwrite: bool) -> Result<(), VolumeFsError> {
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;
        if !from_path.exists() {
            return Err(VolumeFsError::NotFound(self.display_path(from)?));
        }
        if to_path.exists() && !overwrite {
            return Err(VolumeFsError::AlreadyExists(self.display_path(to)?));
        }
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, &e))?;
        }
        fs::rename(&from_path, &to_path).map_err(|e| io_err(&from_path, &e))
    }

    /// Recursive case-insensitive name search under `requested`.
    pub fn search(&self, requested: &str, query: &str) -> Result<Vec<VolumeEntry>, VolumeFsError> {
        let needle = query.to_lowercase();
        let mut out = Vec::new();
        let mut stack = vec![self.display_path(requested)?];
        while let Some(dir) = stack.pop() {
            let entries = match self.list(&dir) {
                Ok(entries) => entries,
                // Race: a directory can vanish between listing and descent.
                Err(VolumeFsError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            for entry in entries {
                if entry.name.to_lowercase().contains(&needle) {
                    out.push(entry.clone());
                }
                if entry.is_dir && !entry.is_symlink {
                    stack.push(entry.path.clone());
                }
            }
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }
}

#[cfg(test)]
#[path = "volumes_tests.rs"]
mod tests;
