// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request authentication.
//!
//! Token verification itself lives outside the core; handlers only see
//! the [`TokenVerifier`] seam and the [`CallContext`] it produces.
//! Streaming handlers authenticate explicitly because unary middleware
//! does not always run for them.

use async_trait::async_trait;

use sv_core::{CallContext, Status, UserId};

use crate::config::{Config, DEV_DUMMY_TOKEN};

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<UserId, Status>;
}

/// Verifier for `DISABLE_AUTH=true` local development: accepts the
/// development token (and any other non-empty token) as the dev user.
#[derive(Debug, Clone, Default)]
pub struct DevTokenVerifier;

#[async_trait]
impl TokenVerifier for DevTokenVerifier {
    async fn verify(&self, token: &str) -> Result<UserId, Status> {
        if token.is_empty() {
            return Err(Status::unauthenticated("missing token"));
        }
        Ok(UserId::new("dev-user"))
    }
}

/// Header bag reduced to what authentication needs.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub authorization: Option<String>,
    pub x_forwarded_for: Option<String>,
    pub x_real_ip: Option<String>,
    pub user_agent: Option<String>,
    pub origin: Option<String>,
}

impl RequestMeta {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let get = |name: &str| {
            headers.get(name).and_then(|v| v.to_str().ok()).map(|v| v.to_string())
        };
        Self {
            authorization: get("authorization"),
            x_forwarded_for: get("x-forwarded-for"),
            x_real_ip: get("x-real-ip"),
            user_agent: get("user-agent"),
            origin: get("origin"),
        }
    }

    /// Bearer token from the Authorization header.
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.authorization.as_deref()?;
        value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Client IP, preferring `X-Forwarded-For` then `X-Real-IP`.
    pub fn client_ip(&self) -> Option<String> {
        if let Some(forwarded) = &self.x_forwarded_for {
            let first = forwarded.split(',').next().map(str::trim).unwrap_or("");
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
        self.x_real_ip.clone()
    }

    /// Headers propagated on forwarded hops.
    pub fn forwarded_headers(&self) -> Vec<(String, String)> {
        self.authorization
            .as_ref()
            .map(|v| vec![("Authorization".to_string(), v.clone())])
            .unwrap_or_default()
    }
}

/// Authenticate a request into a [`CallContext`].
pub async fn authenticate(
    config: &Config,
    verifier: &dyn TokenVerifier,
    meta: &RequestMeta,
) -> Result<CallContext, Status> {
    let token = meta
        .bearer_token()
        .ok_or_else(|| Status::unauthenticated("missing bearer token"))?;
    authenticate_token(config, verifier, token, meta).await
}

/// Token-level variant for the terminal endpoint, where the token arrives
/// in the init message rather than a header.
pub async fn authenticate_token(
    config: &Config,
    verifier: &dyn TokenVerifier,
    token: &str,
    meta: &RequestMeta,
) -> Result<CallContext, Status> {
    if token.is_empty() {
        return Err(Status::unauthenticated("missing token"));
    }
    let user = if config.disable_auth && token == DEV_DUMMY_TOKEN {
        UserId::new("dev-user")
    } else {
        verifier.verify(token).await?
    };
    Ok(CallContext::for_user(user)
        .with_token(token)
        .with_client(meta.client_ip(), meta.user_agent.clone()))
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
