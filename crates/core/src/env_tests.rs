// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn set_preserves_insertion_order() {
    let mut env = EnvMap::new();
    env.set("B", "2");
    env.set("A", "1");
    env.set("C", "3");
    let keys: Vec<_> = env.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["B", "A", "C"]);
}

#[test]
fn replace_keeps_position() {
    let mut env = EnvMap::new();
    env.set("A", "1");
    env.set("B", "2");
    env.set("A", "changed");
    let entries: Vec<_> = env.iter().collect();
    assert_eq!(entries, [("A", "changed"), ("B", "2")]);
}

#[test]
fn remove_returns_value() {
    let mut env = EnvMap::new();
    env.set("A", "1");
    assert_eq!(env.remove("A"), Some("1".to_string()));
    assert_eq!(env.remove("A"), None);
    assert!(env.is_empty());
}

#[test]
fn serializes_to_json_object() {
    let mut env = EnvMap::new();
    env.set("PORT", "8080");
    env.set("MODE", "prod");
    let json = serde_json::to_string(&env).unwrap();
    assert_eq!(json, r#"{"PORT":"8080","MODE":"prod"}"#);
}

#[test]
fn round_trips_through_json() {
    let mut env = EnvMap::new();
    env.set("Z", "last");
    env.set("A", "first");
    let json = serde_json::to_string(&env).unwrap();
    let back: EnvMap = serde_json::from_str(&json).unwrap();
    assert_eq!(back, env);
}

#[test]
fn engine_pairs_format() {
    let mut env = EnvMap::new();
    env.set("EULA", "true");
    assert_eq!(env.to_engine_pairs(), ["EULA=true"]);
}
