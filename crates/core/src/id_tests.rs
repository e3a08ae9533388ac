// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

#[test]
fn hash_map_lookup_by_str() {
    let mut map = HashMap::new();
    map.insert(WorkloadId::new("deploy-1"), 7);
    assert_eq!(map.get("deploy-1"), Some(&7));
}

#[test]
fn short_truncates() {
    let id = ContainerId::new("abcdef0123456789");
    assert_eq!(id.short(12), "abcdef012345");
    assert_eq!(ContainerId::new("abc").short(12), "abc");
}

#[test]
fn short_fn_on_str() {
    assert_eq!(short("abcdefgh", 4), "abcd");
    assert_eq!(short("ab", 4), "ab");
}

#[test]
fn serde_round_trip_is_plain_string() {
    let id = NodeId::new("node-a");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"node-a\"");
    let back: NodeId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn container_prefix_match_both_directions() {
    let id = ContainerId::new("ABCdef0123456789");
    assert!(id.matches("abcdef"));
    assert!(ContainerId::new("abcdef").matches("ABCdef0123456789"));
    assert!(!id.matches("def"));
    assert!(!ContainerId::new("").matches("abc"));
}

#[test]
fn build_id_generate_unique() {
    assert_ne!(BuildId::generate(), BuildId::generate());
}
