// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status ↔ HTTP mapping and the error body shape clients parse.

use serde::{Deserialize, Serialize};
use sv_core::{ErrorCode, NeedsBuild, Status};

/// HTTP status carried by an RPC error response.
pub fn http_status_for(code: ErrorCode) -> u16 {
    match code {
        ErrorCode::Unauthenticated => 401,
        ErrorCode::PermissionDenied => 403,
        ErrorCode::NotFound => 404,
        ErrorCode::InvalidArgument => 400,
        ErrorCode::FailedPrecondition => 412,
        ErrorCode::Internal => 500,
        ErrorCode::Unimplemented => 501,
    }
}

/// Inverse mapping used when a forwarded hop comes back with a bare HTTP
/// status. Everything unrecognized is `Internal`.
pub fn code_for_http_status(status: u16) -> ErrorCode {
    match status {
        401 => ErrorCode::Unauthenticated,
        403 => ErrorCode::PermissionDenied,
        404 => ErrorCode::NotFound,
        _ => ErrorCode::Internal,
    }
}

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_build: Option<NeedsBuild>,
}

impl From<Status> for ErrorBody {
    fn from(status: Status) -> Self {
        Self { code: status.code, message: status.message, needs_build: status.needs_build }
    }
}

impl From<ErrorBody> for Status {
    fn from(body: ErrorBody) -> Self {
        Self { code: body.code, message: body.message, needs_build: body.needs_build }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
