// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn wildcard_origin_allows_anything() {
    let config = Config::default();
    assert!(config.origin_allowed(Some("https://evil.example")));
    assert!(config.origin_allowed(None));
}

#[test]
fn explicit_origins_are_matched_case_insensitively() {
    let config = Config {
        allowed_origins: vec!["https://app.example.com".to_string()],
        ..Config::default()
    };
    assert!(config.origin_allowed(Some("https://APP.example.com")));
    assert!(!config.origin_allowed(Some("https://other.example.com")));
    assert!(!config.origin_allowed(None));
}

#[test]
fn defaults_are_sane() {
    let config = Config::default();
    assert_eq!(config.base_domain, "my.obiente.cloud");
    assert!(!config.disable_auth);
    assert_eq!(config.reconcile_period, Duration::from_secs(30));
}
