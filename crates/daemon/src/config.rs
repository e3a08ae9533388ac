// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration, read from the environment.

use std::time::Duration;

/// Development token accepted when auth is disabled.
pub const DEV_DUMMY_TOKEN: &str = "dev-dummy-token";

#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address, e.g. `0.0.0.0:8443`.
    pub listen_addr: String,
    /// This node's identity in the location table.
    pub node_id: String,
    /// Hostname peers reach this node under.
    pub node_host: String,
    /// Base domain for generated default domains.
    pub base_domain: String,
    /// `DISABLE_AUTH=true` accepts the development token.
    pub disable_auth: bool,
    /// Allowed WebSocket origins; `*` allows any.
    pub allowed_origins: Vec<String>,
    /// Reconciler sweep period.
    pub reconcile_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8443".to_string(),
            node_id: "node-local".to_string(),
            node_host: "localhost".to_string(),
            base_domain: "my.obiente.cloud".to_string(),
            disable_auth: false,
            allowed_origins: vec!["*".to_string()],
            reconcile_period: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load from the environment, falling back to defaults per field.
    pub fn load() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: env_or("SV_LISTEN_ADDR", &defaults.listen_addr),
            node_id: env_or("SV_NODE_ID", &defaults.node_id),
            node_host: env_or("SV_NODE_HOST", &defaults.node_host),
            base_domain: env_or("SV_BASE_DOMAIN", &defaults.base_domain),
            disable_auth: std::env::var("DISABLE_AUTH").is_ok_and(|v| v == "true"),
            allowed_origins: std::env::var("SV_ALLOWED_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.allowed_origins),
            reconcile_period: std::env::var("SV_RECONCILE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.reconcile_period),
        }
    }

    /// Origin check for the terminal endpoint; a wildcard allows any.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allowed_origins.iter().any(|o| o == "*") {
            return true;
        }
        match origin {
            Some(origin) => self.allowed_origins.iter().any(|o| o.eq_ignore_ascii_case(origin)),
            None => false,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
