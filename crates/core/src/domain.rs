// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom domain records for deployments.
//!
//! Persisted inside the workload's JSON custom-domain list as
//! colon-delimited records: `domain[:token[:value[:verified]]]`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A custom domain attached to a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomDomain {
    /// Bare domain, no verification started.
    Plain { domain: String },
    /// Verification pending: a DNS token has been issued.
    Pending { domain: String, token: String, value: Option<String> },
    /// Verification completed; eligible as a routing rule target.
    Verified { domain: String, token: String, value: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainParseError {
    #[error("empty domain record")]
    Empty,
    #[error("invalid domain record: {0:?}")]
    Malformed(String),
}

impl CustomDomain {
    pub fn domain(&self) -> &str {
        match self {
            Self::Plain { domain } | Self::Pending { domain, .. } | Self::Verified { domain, .. } => domain,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    /// Parse a colon-delimited record.
    pub fn parse(record: &str) -> Result<Self, DomainParseError> {
        let record = record.trim();
        if record.is_empty() {
            return Err(DomainParseError::Empty);
        }
        let parts: Vec<&str> = record.split(':').collect();
        match parts.as_slice() {
            [domain] => Ok(Self::Plain { domain: (*domain).to_string() }),
            [domain, token] => Ok(Self::Pending {
                domain: (*domain).to_string(),
                token: (*token).to_string(),
                value: None,
            }),
            [domain, token, value] => Ok(Self::Pending {
                domain: (*domain).to_string(),
                token: (*token).to_string(),
                value: Some((*value).to_string()),
            }),
            [domain, token, value, "verified"] => Ok(Self::Verified {
                domain: (*domain).to_string(),
                token: (*token).to_string(),
                value: (*value).to_string(),
            }),
            _ => Err(DomainParseError::Malformed(record.to_string())),
        }
    }

    /// Encode back to the colon-delimited persistence form.
    pub fn encode(&self) -> String {
        match self {
            Self::Plain { domain } => domain.clone(),
            Self::Pending { domain, token, value: None } => format!("{}:{}", domain, token),
            Self::Pending { domain, token, value: Some(value) } => {
                format!("{}:{}:{}", domain, token, value)
            }
            Self::Verified { domain, token, value } => {
                format!("{}:{}:{}:verified", domain, token, value)
            }
        }
    }
}

impl Serialize for CustomDomain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for CustomDomain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = String::deserialize(deserializer)?;
        Self::parse(&record).map_err(serde::de::Error::custom)
    }
}

/// Case-insensitive unique by domain, first occurrence wins, order preserved.
pub fn dedupe_custom_domains(domains: Vec<CustomDomain>) -> Vec<CustomDomain> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::with_capacity(domains.len());
    for d in domains {
        let key = d.domain().to_ascii_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(d);
        }
    }
    out
}

#[cfg(test)]
#[path = "domain_tests.rs"]
mod tests;
