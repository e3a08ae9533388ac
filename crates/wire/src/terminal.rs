// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal WebSocket protocol.
//!
//! Single JSON channel, discriminated by `type`. The first client message
//! must be `init`; anything else closes the socket with a protocol error.

use serde::{Deserialize, Serialize};

/// Messages from the browser to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Init {
        #[serde(default)]
        deployment_id: Option<String>,
        #[serde(default)]
        game_server_id: Option<String>,
        organization_id: String,
        token: String,
        #[serde(default)]
        container_id: Option<String>,
        #[serde(default)]
        service_name: Option<String>,
        #[serde(default)]
        cols: Option<u16>,
        #[serde(default)]
        rows: Option<u16>,
    },
    Input {
        input: Vec<u8>,
    },
    Resize {
        cols: u16,
        rows: u16,
    },
    Ping,
}

impl ClientMessage {
    /// Workload id from an init message, whichever field is set.
    pub fn workload_id(&self) -> Option<&str> {
        match self {
            Self::Init { deployment_id, game_server_id, .. } => {
                deployment_id.as_deref().or(game_server_id.as_deref())
            }
            _ => None,
        }
    }
}

/// Messages from the daemon to the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Connected,
    Output {
        data: Vec<u8>,
    },
    Error {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Closed {
        reason: String,
        #[serde(default)]
        exit: Option<i32>,
    },
    Pong,
}

/// WebSocket close codes used by the terminal endpoint.
pub mod close_code {
    pub const NORMAL: u16 = 1000;
    pub const PROTOCOL_ERROR: u16 = 1002;
    pub const POLICY_VIOLATION: u16 = 1008;
    pub const INTERNAL_ERROR: u16 = 1011;
}

#[cfg(test)]
#[path = "terminal_tests.rs"]
mod tests;
