// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::testutil::{authed_meta, body_of, read_json, test_state};
use serde_json::json;

async fn call(
    state: &crate::server::AppState,
    method: &str,
    body: serde_json::Value,
) -> axum::response::Response {
    dispatch(state.clone(), method.to_string(), authed_meta(), body_of(body)).await
}

#[tokio::test]
async fn create_deployment_matches_contract() {
    let (_h, state) = test_state();
    let response =
        call(&state, "CreateDeployment", json!({"organizationId": "org1", "name": "svc"})).await;
    let (status, body): (u16, serde_json::Value) = read_json(response).await;
    assert_eq!(status, 200);
    let deployment = &body["deployment"];
    assert_eq!(deployment["id"], "deploy-1722470400");
    assert_eq!(deployment["status"], "created");
    assert_eq!(deployment["domain"], "deploy-1722470400.my.obiente.cloud");
    assert_eq!(deployment["groups"], json!([]));
    assert_eq!(deployment["customDomains"], json!([]));
}

#[tokio::test]
async fn missing_token_is_401() {
    let (_h, state) = test_state();
    let response = dispatch(
        state.clone(),
        "ListDeployments".to_string(),
        crate::auth::RequestMeta::default(),
        body_of(json!({"organizationId": "org1"})),
    )
    .await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn unknown_method_is_501() {
    let (_h, state) = test_state();
    let response = call(&state, "FrobnicateDeployment", json!({})).await;
    assert_eq!(response.status().as_u16(), 501);
}

#[tokio::test]
async fn get_missing_deployment_is_404() {
    let (_h, state) = test_state();
    let response = call(
        &state,
        "GetDeployment",
        json!({"organizationId": "org1", "deploymentId": "deploy-nope"}),
    )
    .await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn trigger_on_empty_deployment_eventually_fails_needs_build() {
    let (h, state) = test_state();
    call(&state, "CreateDeployment", json!({"organizationId": "org1", "name": "svc"})).await;

    let response = call(
        &state,
        "TriggerDeployment",
        json!({"organizationId": "org1", "deploymentId": "deploy-1722470400"}),
    )
    .await;
    let (status, body): (u16, serde_json::Value) = read_json(response).await;
    assert_eq!(status, 200);
    assert_eq!(body["buildNumber"], 1);

    // The build runs on a detached task; wait for the terminal state.
    let id = sv_core::WorkloadId::new("deploy-1722470400");
    for _ in 0..100 {
        let w = sv_storage::WorkloadRepository::get_by_id(&h.store, &id)
            .await
            .unwrap()
            .unwrap();
        if w.status == sv_core::LifecycleStatus::Failed {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("build never reached Failed");
}

#[tokio::test]
async fn routing_update_forces_protocol_ssl_invariant() {
    let (_h, state) = test_state();
    call(&state, "CreateDeployment", json!({"organizationId": "org1", "name": "svc"})).await;

    let response = call(
        &state,
        "UpdateDeploymentRoutings",
        json!({
            "organizationId": "org1",
            "deploymentId": "deploy-1722470400",
            "routings": [{
                "id": "",
                "domain": "deploy-1722470400.my.obiente.cloud",
                "targetPort": 80,
                "protocol": "http",
                "sslEnabled": true
            }]
        }),
    )
    .await;
    let (status, body): (u16, serde_json::Value) = read_json(response).await;
    assert_eq!(status, 200);
    assert_eq!(body["routings"][0]["sslEnabled"], false);

    // Replaying the same rules is a no-op in effect.
    let again = call(
        &state,
        "GetDeploymentRoutings",
        json!({"organizationId": "org1", "deploymentId": "deploy-1722470400"}),
    )
    .await;
    let (_, listed): (u16, serde_json::Value) = read_json(again).await;
    assert_eq!(listed["routings"][0]["sslEnabled"], false);
    assert_eq!(listed["routings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn routing_rejects_unverified_custom_domain() {
    let (_h, state) = test_state();
    call(&state, "CreateDeployment", json!({"organizationId": "org1", "name": "svc"})).await;
    let response = call(
        &state,
        "UpdateDeploymentRoutings",
        json!({
            "organizationId": "org1",
            "deploymentId": "deploy-1722470400",
            "routings": [{
                "id": "r1",
                "domain": "unverified.example.com",
                "targetPort": 80,
                "protocol": "http",
                "sslEnabled": false
            }]
        }),
    )
    .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn compose_update_with_errors_does_not_persist() {
    let (h, state) = test_state();
    call(&state, "CreateDeployment", json!({"organizationId": "org1", "name": "svc"})).await;

    let response = call(
        &state,
        "UpdateDeploymentCompose",
        json!({
            "organizationId": "org1",
            "deploymentId": "deploy-1722470400",
            "composeYaml": "volumes:\n  data:\n"
        }),
    )
    .await;
    let (status, body): (u16, serde_json::Value) = read_json(response).await;
    assert_eq!(status, 200);
    assert_eq!(body["updated"], false);
    assert_eq!(body["validation"]["valid"], false);
    assert!(body["validation"]["error"].as_str().unwrap().contains("services"));

    let id = sv_core::WorkloadId::new("deploy-1722470400");
    let w = sv_storage::WorkloadRepository::get_by_id(&h.store, &id).await.unwrap().unwrap();
    assert_eq!(w.compose_yaml, None);

    // A valid manifest persists.
    let response = call(
        &state,
        "UpdateDeploymentCompose",
        json!({
            "organizationId": "org1",
            "deploymentId": "deploy-1722470400",
            "composeYaml": "services:\n  web:\n    image: nginx\n"
        }),
    )
    .await;
    let (_, body): (u16, serde_json::Value) = read_json(response).await;
    assert_eq!(body["updated"], true);
    let w = sv_storage::WorkloadRepository::get_by_id(&h.store, &id).await.unwrap().unwrap();
    assert!(w.compose_yaml.is_some());
}

#[tokio::test]
async fn env_vars_round_trip() {
    let (_h, state) = test_state();
    call(&state, "CreateDeployment", json!({"organizationId": "org1", "name": "svc"})).await;

    let response = call(
        &state,
        "UpdateDeploymentEnvVars",
        json!({
            "organizationId": "org1",
            "deploymentId": "deploy-1722470400",
            "env": {"PORT": "8080", "MODE": "prod"}
        }),
    )
    .await;
    let (status, body): (u16, serde_json::Value) = read_json(response).await;
    assert_eq!(status, 200);
    assert_eq!(body["env"]["PORT"], "8080");

    let response = call(
        &state,
        "GetDeploymentEnvVars",
        json!({"organizationId": "org1", "deploymentId": "deploy-1722470400"}),
    )
    .await;
    let (_, body): (u16, serde_json::Value) = read_json(response).await;
    assert_eq!(body["env"]["MODE"], "prod");
}

#[tokio::test]
async fn service_names_come_from_the_manifest() {
    let (_h, state) = test_state();
    call(
        &state,
        "CreateDeployment",
        json!({
            "organizationId": "org1",
            "name": "svc",
            "composeYaml": "services:\n  web:\n    image: nginx\n  db:\n    image: postgres\n"
        }),
    )
    .await;
    let response = call(
        &state,
        "GetDeploymentServiceNames",
        json!({"organizationId": "org1", "deploymentId": "deploy-1722470400"}),
    )
    .await;
    let (_, body): (u16, serde_json::Value) = read_json(response).await;
    assert_eq!(body["services"], json!(["web", "db"]));
}

#[test]
fn compose_validation_reports_ranges_and_legacy_error() {
    let result = validate_compose(": not yaml\n\t");
    assert!(!result.valid);
    assert!(result.error.is_some());
    assert!(!result.diagnostics.is_empty());

    let warn_only = validate_compose("services:\n  web:\n    command: run\n");
    assert!(warn_only.valid);
    assert_eq!(warn_only.error, None);
    assert_eq!(warn_only.diagnostics.len(), 1);

    assert!(validate_compose("services:\n  web:\n    image: nginx\n").valid);
}

#[tokio::test]
async fn audit_entries_record_mutations() {
    let (h, state) = test_state();
    call(&state, "CreateDeployment", json!({"organizationId": "org1", "name": "svc"})).await;
    let entries = h.audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "CreateDeployment");
    assert_eq!(entries[0].service, "deployments");
    assert_eq!(entries[0].organization_id.as_deref(), Some("org1"));
    assert_eq!(entries[0].response_status, "ok");

    // Reads do not audit.
    call(&state, "ListDeployments", json!({"organizationId": "org1"})).await;
    assert_eq!(h.audit.entries().len(), 1);
}
