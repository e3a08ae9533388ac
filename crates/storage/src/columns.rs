// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON column codecs for the relational drivers.
//!
//! `env_vars`, `groups` and `custom_domains` are JSON-encoded text columns;
//! every driver funnels through these helpers so the encodings cannot
//! drift apart.

use sv_core::{dedupe_custom_domains, CustomDomain, EnvMap};

use crate::error::StorageError;

pub fn encode_env(env: &EnvMap) -> Result<String, StorageError> {
    Ok(serde_json::to_string(env)?)
}

pub fn decode_env(column: &str) -> Result<EnvMap, StorageError> {
    if column.trim().is_empty() {
        return Ok(EnvMap::new());
    }
    Ok(serde_json::from_str(column)?)
}

pub fn encode_groups(groups: &[String]) -> Result<String, StorageError> {
    Ok(serde_json::to_string(groups)?)
}

pub fn decode_groups(column: &str) -> Result<Vec<String>, StorageError> {
    if column.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(column)?)
}

pub fn encode_custom_domains(domains: &[CustomDomain]) -> Result<String, StorageError> {
    let records: Vec<String> = domains.iter().map(CustomDomain::encode).collect();
    Ok(serde_json::to_string(&records)?)
}

/// Decode and dedupe; old rows may carry duplicates from before the
/// uniqueness rule existed.
pub fn decode_custom_domains(column: &str) -> Result<Vec<CustomDomain>, StorageError> {
    if column.trim().is_empty() {
        return Ok(Vec::new());
    }
    let records: Vec<String> = serde_json::from_str(column)?;
    let domains = records
        .iter()
        .map(|r| CustomDomain::parse(r))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(dedupe_custom_domains(domains))
}

#[cfg(test)]
#[path = "columns_tests.rs"]
mod tests;
