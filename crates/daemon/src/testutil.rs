// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for handler tests.

use std::sync::Arc;

use axum::response::Response;
use bytes::Bytes;
use serde::de::DeserializeOwned;

use sv_adapters::{NodeForwarder, StaticNodeDirectory};
use sv_core::NodeId;
use sv_engine::test_support::{harness, TestHarness};

use crate::auth::{DevTokenVerifier, RequestMeta};
use crate::config::Config;
use crate::rpc::gameservers::{NullModCatalog, NullPlayerIdentity};
use crate::server::AppState;

pub fn test_state() -> (TestHarness, AppState) {
    let h = harness();
    let directory = Arc::new(StaticNodeDirectory::new(NodeId::new("node-a")));
    let state = AppState::new(
        Arc::new(Config::default()),
        h.runtime.clone(),
        Arc::new(NodeForwarder::new(directory)),
        Arc::new(DevTokenVerifier),
        Arc::new(NullModCatalog),
        Arc::new(NullPlayerIdentity),
    );
    (h, state)
}

pub fn authed_meta() -> RequestMeta {
    RequestMeta {
        authorization: Some("Bearer test-token".to_string()),
        x_forwarded_for: None,
        x_real_ip: None,
        user_agent: Some("tests".to_string()),
        origin: None,
    }
}

pub fn body_of(value: serde_json::Value) -> Bytes {
    Bytes::from(value.to_string())
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> (u16, T) {
    let status = response.status().as_u16();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap();
    (status, value)
}
