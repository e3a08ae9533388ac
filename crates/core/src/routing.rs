// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deployment routing rules binding an external domain to a service port.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::CustomDomain;
use crate::id::WorkloadId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingValidationError {
    #[error("target_port {0} outside [1, 65535]")]
    PortOutOfRange(u32),
    #[error("domain {0:?} is neither the default domain nor a verified custom domain")]
    UnverifiedDomain(String),
    #[error("routing rule domain is empty")]
    EmptyDomain,
}

/// A rule that binds `domain` (+ optional path prefix) to a service + port
/// of a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: String,
    pub workload_id: WorkloadId,
    pub domain: String,
    pub service_name: Option<String>,
    pub path_prefix: Option<String>,
    pub target_port: u16,
    pub protocol: Protocol,
    pub ssl_enabled: bool,
    pub ssl_cert_resolver: Option<String>,
    pub middleware_json: Option<String>,
}

impl RoutingRule {
    /// Force the protocol/ssl invariant: `http` never carries ssl, `https`
    /// always does. The client's value is overridden, not rejected.
    pub fn normalize(&mut self) {
        match self.protocol {
            Protocol::Http => self.ssl_enabled = false,
            Protocol::Https => self.ssl_enabled = true,
            Protocol::Tcp | Protocol::Udp => {}
        }
    }

    /// Validate against the workload's domain set.
    pub fn validate(
        &self,
        default_domain: &str,
        custom_domains: &[CustomDomain],
    ) -> Result<(), RoutingValidationError> {
        if self.domain.trim().is_empty() {
            return Err(RoutingValidationError::EmptyDomain);
        }
        if self.target_port == 0 {
            return Err(RoutingValidationError::PortOutOfRange(u32::from(self.target_port)));
        }
        let domain = self.domain.to_ascii_lowercase();
        if domain == default_domain.to_ascii_lowercase() {
            return Ok(());
        }
        let verified = custom_domains
            .iter()
            .any(|d| d.is_verified() && d.domain().eq_ignore_ascii_case(&domain));
        if !verified {
            return Err(RoutingValidationError::UnverifiedDomain(self.domain.clone()));
        }
        Ok(())
    }
}

/// Pick the port a deployment's default service should route to.
///
/// Priority: rule for the default service > first rule with a positive
/// target port > workload-level port > 8080.
pub fn resolve_target_port(
    rules: &[RoutingRule],
    default_service: Option<&str>,
    workload_port: Option<u16>,
) -> u16 {
    if let Some(service) = default_service {
        if let Some(rule) = rules
            .iter()
            .find(|r| r.service_name.as_deref() == Some(service) && r.target_port > 0)
        {
            return rule.target_port;
        }
    }
    if let Some(rule) = rules.iter().find(|r| r.target_port > 0) {
        return rule.target_port;
    }
    workload_port.unwrap_or(8080)
}

#[cfg(test)]
#[path = "routing_tests.rs"]
mod tests;
