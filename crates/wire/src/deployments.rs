// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deployment service payloads.
//!
//! One request/response pair per method; field names match the public
//! JSON surface (camelCase).

use serde::{Deserialize, Serialize};
use sv_core::{EnvMap, Protocol};

use crate::compose::ValidateComposeResponse;
use crate::types::{BuildView, ContainerView, WorkloadView};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDeploymentsRequest {
    pub organization_id: String,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDeploymentsResponse {
    pub deployments: Vec<WorkloadView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDeploymentRequest {
    pub organization_id: String,
    pub deployment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDeploymentResponse {
    pub deployment: WorkloadView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeploymentRequest {
    pub organization_id: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub compose_yaml: Option<String>,
    #[serde(default)]
    pub replicas: Option<u32>,
    #[serde(default)]
    pub memory_bytes: Option<u64>,
    #[serde(default)]
    pub cpu_shares: Option<u32>,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeploymentResponse {
    pub deployment: WorkloadView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeploymentRequest {
    pub organization_id: String,
    pub deployment_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub replicas: Option<u32>,
    #[serde(default)]
    pub memory_bytes: Option<u64>,
    #[serde(default)]
    pub cpu_shares: Option<u32>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub groups: Option<Vec<String>>,
    #[serde(default)]
    pub custom_domains: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeploymentResponse {
    pub deployment: WorkloadView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDeploymentRequest {
    pub organization_id: String,
    pub deployment_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteDeploymentResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDeploymentRequest {
    pub organization_id: String,
    pub deployment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDeploymentResponse {
    pub build_id: String,
    pub build_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertToBuildRequest {
    pub organization_id: String,
    pub deployment_id: String,
    pub build_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertToBuildResponse {
    /// Id of the build triggered by the revert. May be empty until the
    /// build producer reports ids synchronously.
    pub build_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBuildsRequest {
    pub organization_id: String,
    pub deployment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBuildsResponse {
    pub builds: Vec<BuildView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBuildRequest {
    pub organization_id: String,
    pub build_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBuildResponse {
    pub build: BuildView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBuildLogsRequest {
    pub organization_id: String,
    pub build_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBuildLogsResponse {
    pub lines: Vec<crate::streams::LogFrame>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBuildRequest {
    pub organization_id: String,
    pub build_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteBuildResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEnvVarsRequest {
    pub organization_id: String,
    pub deployment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEnvVarsResponse {
    pub env: EnvMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEnvVarsRequest {
    pub organization_id: String,
    pub deployment_id: String,
    pub env: EnvMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEnvVarsResponse {
    pub env: EnvMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetComposeRequest {
    pub organization_id: String,
    pub deployment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetComposeResponse {
    pub compose_yaml: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateComposeRequest {
    pub organization_id: String,
    pub deployment_id: String,
    pub compose_yaml: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateComposeRequest {
    pub organization_id: String,
    pub deployment_id: String,
    pub compose_yaml: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateComposeResponse {
    /// Populated (and the manifest left unchanged) when validation found
    /// error-severity diagnostics.
    pub validation: ValidateComposeResponse,
    pub updated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRuleView {
    pub id: String,
    pub domain: String,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub path_prefix: Option<String>,
    pub target_port: u16,
    pub protocol: Protocol,
    pub ssl_enabled: bool,
    #[serde(default)]
    pub ssl_cert_resolver: Option<String>,
    #[serde(default)]
    pub middleware_json: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRoutingsRequest {
    pub organization_id: String,
    pub deployment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRoutingsResponse {
    pub routings: Vec<RoutingRuleView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoutingsRequest {
    pub organization_id: String,
    pub deployment_id: String,
    pub routings: Vec<RoutingRuleView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoutingsResponse {
    pub routings: Vec<RoutingRuleView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetServiceNamesRequest {
    pub organization_id: String,
    pub deployment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetServiceNamesResponse {
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListContainersRequest {
    pub organization_id: String,
    pub deployment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListContainersResponse {
    pub containers: Vec<ContainerView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerOpRequest {
    pub organization_id: String,
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerOpResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamLogsRequest {
    pub organization_id: String,
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub tail: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamBuildLogsRequest {
    pub organization_id: String,
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    #[serde(default)]
    pub build_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetricsRequest {
    pub organization_id: String,
    #[serde(alias = "deploymentId", alias = "gameServerId")]
    pub workload_id: String,
    /// Deliver one aggregate per instant instead of per-container samples.
    #[serde(default)]
    pub aggregate: bool,
}
