// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    unauthenticated = { ErrorCode::Unauthenticated, 401 },
    denied = { ErrorCode::PermissionDenied, 403 },
    not_found = { ErrorCode::NotFound, 404 },
    invalid = { ErrorCode::InvalidArgument, 400 },
    precondition = { ErrorCode::FailedPrecondition, 412 },
    internal = { ErrorCode::Internal, 500 },
    unimplemented = { ErrorCode::Unimplemented, 501 },
)]
fn status_to_http(code: ErrorCode, http: u16) {
    assert_eq!(http_status_for(code), http);
}

#[parameterized(
    unauthenticated = { 401, ErrorCode::Unauthenticated },
    denied = { 403, ErrorCode::PermissionDenied },
    not_found = { 404, ErrorCode::NotFound },
    teapot = { 418, ErrorCode::Internal },
    bad_gateway = { 502, ErrorCode::Internal },
)]
fn http_to_code(http: u16, code: ErrorCode) {
    assert_eq!(code_for_http_status(http), code);
}

#[test]
fn error_body_round_trip() {
    let status = Status::not_found("gone");
    let body: ErrorBody = status.into();
    let json = serde_json::to_string(&body).unwrap();
    let parsed: ErrorBody = serde_json::from_str(&json).unwrap();
    let back: Status = parsed.into();
    assert_eq!(back.code, ErrorCode::NotFound);
    assert_eq!(back.message, "gone");
}
