// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sv_core::ErrorCode;

fn meta_with(auth: Option<&str>, xff: Option<&str>, xri: Option<&str>) -> RequestMeta {
    RequestMeta {
        authorization: auth.map(str::to_string),
        x_forwarded_for: xff.map(str::to_string),
        x_real_ip: xri.map(str::to_string),
        user_agent: Some("test-agent".to_string()),
        origin: None,
    }
}

#[test]
fn bearer_token_extraction() {
    assert_eq!(meta_with(Some("Bearer tok123"), None, None).bearer_token(), Some("tok123"));
    assert_eq!(meta_with(Some("bearer tok123"), None, None).bearer_token(), Some("tok123"));
    assert_eq!(meta_with(Some("Basic abc"), None, None).bearer_token(), None);
    assert_eq!(meta_with(Some("Bearer  "), None, None).bearer_token(), None);
    assert_eq!(meta_with(None, None, None).bearer_token(), None);
}

#[test]
fn client_ip_prefers_forwarded_for() {
    let meta = meta_with(None, Some("10.1.2.3, 172.16.0.1"), Some("192.168.0.9"));
    assert_eq!(meta.client_ip().as_deref(), Some("10.1.2.3"));
    let meta = meta_with(None, None, Some("192.168.0.9"));
    assert_eq!(meta.client_ip().as_deref(), Some("192.168.0.9"));
    assert_eq!(meta_with(None, None, None).client_ip(), None);
}

#[tokio::test]
async fn missing_token_is_unauthenticated() {
    let config = Config::default();
    let err = authenticate(&config, &DevTokenVerifier, &meta_with(None, None, None))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthenticated);
}

#[tokio::test]
async fn dev_token_works_with_auth_disabled() {
    let config = Config { disable_auth: true, ..Config::default() };
    let ctx = authenticate_token(
        &config,
        &DevTokenVerifier,
        DEV_DUMMY_TOKEN,
        &meta_with(None, Some("10.0.0.1"), None),
    )
    .await
    .unwrap();
    assert_eq!(ctx.user().unwrap().as_str(), "dev-user");
    assert_eq!(ctx.client_ip.as_deref(), Some("10.0.0.1"));
}

#[tokio::test]
async fn authenticated_context_carries_token_and_agent() {
    let config = Config::default();
    let ctx = authenticate(
        &config,
        &DevTokenVerifier,
        &meta_with(Some("Bearer abc"), None, None),
    )
    .await
    .unwrap();
    assert_eq!(ctx.token.as_deref(), Some("abc"));
    assert_eq!(ctx.user_agent.as_deref(), Some("test-agent"));
}

#[test]
fn only_authorization_is_forwarded() {
    let meta = meta_with(Some("Bearer abc"), Some("10.0.0.1"), None);
    let headers = meta.forwarded_headers();
    assert_eq!(headers, vec![("Authorization".to_string(), "Bearer abc".to_string())]);
}
