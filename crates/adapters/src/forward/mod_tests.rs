// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sv_core::test_support::LocationBuilder;
use sv_core::ErrorCode;

fn forwarder_with(local: &str, peers: &[(&str, &str)]) -> NodeForwarder {
    let directory = StaticNodeDirectory::new(NodeId::new(local));
    for (node, url) in peers {
        directory.upsert(NodeId::new(*node), *url);
    }
    NodeForwarder::new(Arc::new(directory))
}

#[test]
fn local_container_is_not_forwarded() {
    let forwarder = forwarder_with("node-a", &[]);
    let location = LocationBuilder::default().node("node-a").build();
    assert_eq!(forwarder.should_forward(&location).unwrap(), ForwardTarget::Local);
}

#[test]
fn remote_container_resolves_target() {
    let forwarder = forwarder_with("node-a", &[("node-b", "http://10.0.0.2:8443")]);
    let location = LocationBuilder::default().node("node-b").build();
    match forwarder.should_forward(&location).unwrap() {
        ForwardTarget::Remote { node, base_url } => {
            assert_eq!(node.as_str(), "node-b");
            assert_eq!(base_url, "http://10.0.0.2:8443");
        }
        other => panic!("expected remote target, got {other:?}"),
    }
}

#[test]
fn unknown_node_is_unreachable() {
    let forwarder = forwarder_with("node-a", &[]);
    let location = LocationBuilder::default().node("node-zz").build();
    let err = forwarder.should_forward(&location).unwrap_err();
    assert!(matches!(err, ForwardError::Unreachable(_)));
    let status: Status = err.into();
    assert_eq!(status.code, ErrorCode::Internal);
}

#[test]
fn peer_error_body_passes_through() {
    let body = serde_json::to_vec(&ErrorBody {
        code: ErrorCode::PermissionDenied,
        message: "nope".into(),
        needs_build: None,
    })
    .unwrap();
    let status = status_from_peer(403, &body);
    assert_eq!(status.code, ErrorCode::PermissionDenied);
    assert_eq!(status.message, "nope");
}

#[test]
fn bare_http_statuses_map_one_to_one() {
    assert_eq!(status_from_peer(401, b"").code, ErrorCode::Unauthenticated);
    assert_eq!(status_from_peer(403, b"").code, ErrorCode::PermissionDenied);
    assert_eq!(status_from_peer(404, b"").code, ErrorCode::NotFound);
    assert_eq!(status_from_peer(500, b"").code, ErrorCode::Internal);
    assert_eq!(status_from_peer(502, b"garbage").code, ErrorCode::Internal);
}

#[test]
fn only_authorization_headers_propagate() {
    let headers = vec![
        ("Authorization".to_string(), "Bearer tok".to_string()),
        ("Cookie".to_string(), "secret".to_string()),
        ("X-Request-Id".to_string(), "1".to_string()),
    ];
    let kept = propagated(&headers);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].0, "Authorization");
}
