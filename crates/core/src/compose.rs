// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compose manifest handling.
//!
//! Service enumeration tries a real YAML parse first and falls back to a
//! deterministic indentation-aware scan for manifests the YAML parser
//! rejects (templated or partially invalid files still name their
//! services).

use serde::{Deserialize, Serialize};

/// A compose manifest as stored on a workload: raw YAML text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeManifest {
    pub yaml: String,
}

impl ComposeManifest {
    pub fn new(yaml: impl Into<String>) -> Self {
        Self { yaml: yaml.into() }
    }

    /// Enumerate service names, in manifest order.
    ///
    /// YAML parse first; on failure the indentation fallback scan.
    pub fn parse_services(&self) -> Vec<String> {
        match serde_yaml::from_str::<serde_yaml::Value>(&self.yaml) {
            Ok(value) => {
                let services = value
                    .get("services")
                    .and_then(|s| s.as_mapping())
                    .map(|m| {
                        m.keys()
                            .filter_map(|k| k.as_str().map(str::to_string))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                if services.is_empty() {
                    fallback_parse_services(&self.yaml)
                } else {
                    services
                }
            }
            Err(_) => fallback_parse_services(&self.yaml),
        }
    }

    /// The service whose port the default domain routes to: the first one.
    pub fn default_service(&self) -> Option<String> {
        self.parse_services().into_iter().next()
    }

    /// Per-service image references, where statically present.
    pub fn service_images(&self) -> Vec<(String, Option<String>)> {
        let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(&self.yaml) else {
            return self.parse_services().into_iter().map(|s| (s, None)).collect();
        };
        let Some(services) = value.get("services").and_then(|s| s.as_mapping()) else {
            return self.parse_services().into_iter().map(|s| (s, None)).collect();
        };
        services
            .iter()
            .filter_map(|(k, v)| {
                let name = k.as_str()?.to_string();
                let image = v.get("image").and_then(|i| i.as_str()).map(str::to_string);
                Some((name, image))
            })
            .collect()
    }
}

/// Indentation-aware service scan.
///
/// Finds the `services:` line, then collects keys at indent
/// `services_indent + 1` or `services_indent + 2`, stopping at the first
/// line that dedents back to (or above) the `services:` level. Pure and
/// deterministic.
pub fn fallback_parse_services(yaml: &str) -> Vec<String> {
    let mut services = Vec::new();
    let mut services_indent: Option<usize> = None;
    let mut key_indent: Option<usize> = None;

    for raw in yaml.lines() {
        let trimmed = raw.trim_end();
        if trimmed.trim().is_empty() || trimmed.trim_start().starts_with('#') {
            continue;
        }
        let indent = indent_width(trimmed);
        let body = trimmed.trim_start();

        match services_indent {
            None => {
                if body == "services:" {
                    services_indent = Some(indent);
                }
            }
            Some(base) => {
                if indent <= base {
                    break;
                }
                let key_ok = match key_indent {
                    Some(k) => indent == k,
                    None => indent == base + 1 || indent == base + 2,
                };
                if key_ok {
                    if let Some(name) = service_key(body) {
                        if key_indent.is_none() {
                            key_indent = Some(indent);
                        }
                        if !services.contains(&name) {
                            services.push(name);
                        }
                    }
                }
            }
        }
    }
    services
}

fn indent_width(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ').count()
}

/// `name:` or `name: {…}` lines are service keys; list items and
/// quoted scalars are not.
fn service_key(body: &str) -> Option<String> {
    if body.starts_with('-') {
        return None;
    }
    let (name, rest) = body.split_once(':')?;
    let name = name.trim();
    if name.is_empty()
        || name.contains(' ')
        || name.starts_with('"')
        || name.starts_with('\'')
        || !rest.trim().is_empty() && !rest.trim().starts_with('{')
    {
        // `key: value` pairs inside a service body are attributes, not
        // service names; top-level keys always have empty or map rests.
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
#[path = "compose_tests.rs"]
mod tests;
