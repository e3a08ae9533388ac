// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    plain = { "example.com" },
    pending = { "example.com:tok123" },
    pending_value = { "example.com:tok123:abc" },
    verified = { "example.com:tok123:abc:verified" },
)]
fn encode_parse_round_trip(record: &str) {
    let parsed = CustomDomain::parse(record).unwrap();
    assert_eq!(parsed.encode(), record);
}

#[test]
fn parse_variants() {
    assert_eq!(
        CustomDomain::parse("a.io").unwrap(),
        CustomDomain::Plain { domain: "a.io".into() }
    );
    assert_eq!(
        CustomDomain::parse("a.io:t").unwrap(),
        CustomDomain::Pending { domain: "a.io".into(), token: "t".into(), value: None }
    );
    assert_eq!(
        CustomDomain::parse("a.io:t:v:verified").unwrap(),
        CustomDomain::Verified { domain: "a.io".into(), token: "t".into(), value: "v".into() }
    );
}

#[test]
fn parse_rejects_empty_and_overlong() {
    assert_eq!(CustomDomain::parse("  "), Err(DomainParseError::Empty));
    assert!(matches!(
        CustomDomain::parse("a:b:c:d:e"),
        Err(DomainParseError::Malformed(_))
    ));
    // Four parts with a non-"verified" tail is malformed, not silently pending.
    assert!(matches!(
        CustomDomain::parse("a.io:t:v:nope"),
        Err(DomainParseError::Malformed(_))
    ));
}

#[test]
fn verified_flag() {
    assert!(CustomDomain::parse("a.io:t:v:verified").unwrap().is_verified());
    assert!(!CustomDomain::parse("a.io:t").unwrap().is_verified());
}

#[test]
fn dedupe_is_case_insensitive_first_wins() {
    let domains = vec![
        CustomDomain::Plain { domain: "App.Example.com".into() },
        CustomDomain::Plain { domain: "app.example.COM".into() },
        CustomDomain::Plain { domain: "other.example.com".into() },
    ];
    let deduped = dedupe_custom_domains(domains);
    assert_eq!(deduped.len(), 2);
    assert_eq!(deduped[0].domain(), "App.Example.com");
    assert_eq!(deduped[1].domain(), "other.example.com");
}

#[test]
fn serde_uses_colon_records() {
    let d = CustomDomain::Verified { domain: "a.io".into(), token: "t".into(), value: "v".into() };
    assert_eq!(serde_json::to_string(&d).unwrap(), "\"a.io:t:v:verified\"");
    let list: Vec<CustomDomain> = serde_json::from_str(r#"["a.io","b.io:t"]"#).unwrap();
    assert_eq!(list.len(), 2);
}
