// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use sv_core::Status;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StorageError> for Status {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::NotFound(_) => Status::not_found(err.to_string()),
            StorageError::Conflict(_) => Status::failed_precondition(err.to_string()),
            StorageError::Serialization(_) | StorageError::Backend(_) => {
                Status::internal(err.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
