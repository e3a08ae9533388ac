// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::domain::CustomDomain;

fn rule(domain: &str, protocol: Protocol, ssl: bool) -> RoutingRule {
    RoutingRule {
        id: "r1".into(),
        workload_id: WorkloadId::new("deploy-1"),
        domain: domain.into(),
        service_name: None,
        path_prefix: None,
        target_port: 80,
        protocol,
        ssl_enabled: ssl,
        ssl_cert_resolver: None,
        middleware_json: None,
    }
}

#[test]
fn http_forces_ssl_off() {
    let mut r = rule("a.io", Protocol::Http, true);
    r.normalize();
    assert!(!r.ssl_enabled);
}

#[test]
fn https_forces_ssl_on() {
    let mut r = rule("a.io", Protocol::Https, false);
    r.normalize();
    assert!(r.ssl_enabled);
}

#[test]
fn tcp_udp_keep_client_value() {
    let mut r = rule("a.io", Protocol::Tcp, true);
    r.normalize();
    assert!(r.ssl_enabled);
}

#[test]
fn default_domain_is_always_allowed() {
    let r = rule("Deploy-1.my.obiente.cloud", Protocol::Http, false);
    assert!(r.validate("deploy-1.my.obiente.cloud", &[]).is_ok());
}

#[test]
fn custom_domain_must_be_verified() {
    let pending = CustomDomain::Pending { domain: "a.io".into(), token: "t".into(), value: None };
    let verified =
        CustomDomain::Verified { domain: "a.io".into(), token: "t".into(), value: "v".into() };
    let r = rule("a.io", Protocol::Http, false);
    assert_eq!(
        r.validate("deploy-1.x", std::slice::from_ref(&pending)),
        Err(RoutingValidationError::UnverifiedDomain("a.io".into()))
    );
    assert!(r.validate("deploy-1.x", &[verified]).is_ok());
}

#[test]
fn zero_port_rejected() {
    let mut r = rule("a.io", Protocol::Http, false);
    r.target_port = 0;
    assert_eq!(r.validate("a.io", &[]), Err(RoutingValidationError::PortOutOfRange(0)));
}

#[test]
fn target_port_priority_default_service_first() {
    let mut web = rule("a.io", Protocol::Http, false);
    web.service_name = Some("web".into());
    web.target_port = 3000;
    let mut other = rule("a.io", Protocol::Http, false);
    other.target_port = 9000;
    let rules = vec![other, web];
    assert_eq!(resolve_target_port(&rules, Some("web"), Some(5000)), 3000);
}

#[test]
fn target_port_falls_back_to_first_positive_rule() {
    let mut zero = rule("a.io", Protocol::Http, false);
    zero.target_port = 0;
    let mut positive = rule("a.io", Protocol::Http, false);
    positive.target_port = 9000;
    assert_eq!(resolve_target_port(&[zero, positive], Some("web"), Some(5000)), 9000);
}

#[test]
fn target_port_workload_then_default() {
    assert_eq!(resolve_target_port(&[], None, Some(5000)), 5000);
    assert_eq!(resolve_target_port(&[], None, None), 8080);
}
