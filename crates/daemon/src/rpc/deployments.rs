// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deployments service handlers.

use std::time::Instant;

use axum::response::Response;
use bytes::Bytes;

use sv_core::{
    dedupe_custom_domains, CallContext, ComposeManifest, CustomDomain, OrgId, Permission,
    ResourceType, RoutingRule, ScopedPermission, Status, Workload, WorkloadId, WorkloadKind,
};
use sv_engine::NewWorkload;
use sv_wire::compose::{ComposeDiagnostic, DiagnosticSeverity, ValidateComposeResponse};
use sv_wire::deployments::*;
use sv_wire::types::{BuildView, ContainerView, WorkloadView};

use crate::auth::{authenticate, RequestMeta};
use crate::rpc::{
    emit_audit, error_response, is_audited, json_response, parse_body, workload_id_from_body,
};
use crate::server::{unknown_method, AppState};

pub async fn dispatch(state: AppState, method: String, meta: RequestMeta, body: Bytes) -> Response {
    let started = Instant::now();
    let ctx = match authenticate(&state.config, state.verifier.as_ref(), &meta).await {
        Ok(ctx) => ctx,
        Err(e) => return error_response(e),
    };

    let result = route(&state, &ctx, &meta, &method, &body).await;
    if is_audited(&method) {
        let resource =
            workload_id_from_body(&body).map(|w| w.to_string()).unwrap_or_default();
        emit_audit(
            &state,
            &ctx,
            super::org_id_from_body(&body),
            "deployments",
            &method,
            &resource,
            Some(String::from_utf8_lossy(&body).into_owned()),
            result.as_ref().err(),
            started,
        );
    }
    result.unwrap_or_else(error_response)
}

async fn route(
    state: &AppState,
    ctx: &CallContext,
    meta: &RequestMeta,
    method: &str,
    body: &Bytes,
) -> Result<Response, Status> {
    match method {
        "ListDeployments" => {
            let req: ListDeploymentsRequest = parse_body(body)?;
            Ok(json_response(&list_deployments(state, ctx, req).await?))
        }
        "GetDeployment" => {
            let req: GetDeploymentRequest = parse_body(body)?;
            Ok(json_response(&get_deployment(state, ctx, req).await?))
        }
        "CreateDeployment" => {
            let req: CreateDeploymentRequest = parse_body(body)?;
            Ok(json_response(&create_deployment(state, ctx, req).await?))
        }
        "UpdateDeployment" => {
            let req: UpdateDeploymentRequest = parse_body(body)?;
            Ok(json_response(&update_deployment(state, ctx, req).await?))
        }
        "DeleteDeployment" => {
            let req: DeleteDeploymentRequest = parse_body(body)?;
            state.lifecycle.delete_workload(ctx, &WorkloadId::new(req.deployment_id)).await?;
            Ok(json_response(&DeleteDeploymentResponse::default()))
        }
        "TriggerDeployment" => {
            let req: TriggerDeploymentRequest = parse_body(body)?;
            Ok(json_response(&trigger_deployment(state, ctx, req).await?))
        }
        "RevertToBuild" => {
            let req: RevertToBuildRequest = parse_body(body)?;
            Ok(json_response(&revert_to_build(state, ctx, req).await?))
        }
        "ListBuilds" => {
            let req: ListBuildsRequest = parse_body(body)?;
            Ok(json_response(&list_builds(state, ctx, req).await?))
        }
        "GetBuild" => {
            let req: GetBuildRequest = parse_body(body)?;
            Ok(json_response(&get_build(state, ctx, req).await?))
        }
        "GetBuildLogs" => {
            let req: GetBuildLogsRequest = parse_body(body)?;
            Ok(json_response(&get_build_logs(state, ctx, req).await?))
        }
        "DeleteBuild" => {
            let req: DeleteBuildRequest = parse_body(body)?;
            delete_build(state, ctx, req).await?;
            Ok(json_response(&DeleteBuildResponse::default()))
        }
        "GetDeploymentEnvVars" => {
            let req: GetEnvVarsRequest = parse_body(body)?;
            let w = load_deployment(state, ctx, &req.deployment_id, Permission::View).await?;
            Ok(json_response(&GetEnvVarsResponse { env: w.env }))
        }
        "UpdateDeploymentEnvVars" => {
            let req: UpdateEnvVarsRequest = parse_body(body)?;
            let mut w = load_deployment(state, ctx, &req.deployment_id, Permission::View).await?;
            w.env = req.env;
            let updated = state.lifecycle.update_workload(ctx, w).await?;
            Ok(json_response(&UpdateEnvVarsResponse { env: updated.env }))
        }
        "GetDeploymentCompose" => {
            let req: GetComposeRequest = parse_body(body)?;
            let w = load_deployment(state, ctx, &req.deployment_id, Permission::View).await?;
            Ok(json_response(&GetComposeResponse {
                compose_yaml: w.compose_yaml.unwrap_or_default(),
            }))
        }
        "ValidateDeploymentCompose" => {
            let req: ValidateComposeRequest = parse_body(body)?;
            load_deployment(state, ctx, &req.deployment_id, Permission::View).await?;
            Ok(json_response(&validate_compose(&req.compose_yaml)))
        }
        "UpdateDeploymentCompose" => {
            let req: UpdateComposeRequest = parse_body(body)?;
            Ok(json_response(&update_compose(state, ctx, req).await?))
        }
        "GetDeploymentRoutings" => {
            let req: GetRoutingsRequest = parse_body(body)?;
            load_deployment(state, ctx, &req.deployment_id, Permission::View).await?;
            let rules = state
                .rt
                .routings
                .get_for_workload(&WorkloadId::new(req.deployment_id))
                .await?;
            Ok(json_response(&GetRoutingsResponse {
                routings: rules.iter().map(routing_view).collect(),
            }))
        }
        "UpdateDeploymentRoutings" => {
            let req: UpdateRoutingsRequest = parse_body(body)?;
            Ok(json_response(&update_routings(state, ctx, req).await?))
        }
        "GetDeploymentServiceNames" => {
            let req: GetServiceNamesRequest = parse_body(body)?;
            let w = load_deployment(state, ctx, &req.deployment_id, Permission::View).await?;
            let services = w
                .compose_yaml
                .map(|yaml| ComposeManifest::new(yaml).parse_services())
                .unwrap_or_default();
            Ok(json_response(&GetServiceNamesResponse { services }))
        }
        "ListDeploymentContainers" => {
            let req: ListContainersRequest = parse_body(body)?;
            Ok(json_response(&list_containers(state, ctx, req).await?))
        }
        "StartContainer" | "StopContainer" | "RestartContainer" => {
            container_op(state, ctx, meta, method, body).await
        }
        "StreamContainerLogs" | "StreamDeploymentLogs" => {
            super::streams::stream_workload_logs(state, ctx, meta, "deployments", method, body)
                .await
        }
        "StreamBuildLogs" => {
            super::streams::stream_build_logs(state, ctx, "deployments", body).await
        }
        "StreamLiveMetrics" => {
            super::streams::stream_live_metrics(
                state,
                ctx,
                meta,
                "deployments",
                body,
                ResourceType::Deployment,
            )
            .await
        }
        "ListContainerFiles" | "GetContainerFile" | "SearchContainerFiles"
        | "UploadContainerFiles" | "WriteContainerFile" | "DeleteContainerEntries"
        | "CreateContainerEntry" | "RenameContainerEntry" | "ExtractDeploymentFile"
        | "CreateDeploymentFileArchive" => {
            super::files::dispatch(state, ctx, meta, "deployments", method, body).await
        }
        other => Ok(unknown_method("deployments", other)),
    }
}

/// Load a deployment and run the scoped permission check.
pub(crate) async fn load_deployment(
    state: &AppState,
    ctx: &CallContext,
    id: &str,
    permission: Permission,
) -> Result<Workload, Status> {
    load_workload(state, ctx, id, WorkloadKind::Deployment, permission).await
}

pub(crate) async fn load_workload(
    state: &AppState,
    ctx: &CallContext,
    id: &str,
    kind: WorkloadKind,
    permission: Permission,
) -> Result<Workload, Status> {
    if id.trim().is_empty() {
        return Err(Status::invalid_argument("workload id is empty"));
    }
    let workload = state
        .rt
        .workloads
        .get_by_id(&WorkloadId::new(id))
        .await?
        .filter(|w| !w.is_deleted() && w.kind == kind)
        .ok_or_else(|| Status::not_found(format!("workload {id} not found")))?;
    let resource_type = match kind {
        WorkloadKind::Deployment => ResourceType::Deployment,
        WorkloadKind::GameServer => ResourceType::Gameserver,
    };
    let scoped = ScopedPermission::new(permission, resource_type).on(id);
    state.rt.check_permission(ctx, &workload.org_id, &scoped).await?;
    Ok(workload)
}

async fn list_deployments(
    state: &AppState,
    ctx: &CallContext,
    req: ListDeploymentsRequest,
) -> Result<ListDeploymentsResponse, Status> {
    let org = OrgId::new(req.organization_id);
    let scoped = ScopedPermission::new(Permission::View, ResourceType::Deployment);
    state.rt.check_permission(ctx, &org, &scoped).await?;

    let workloads = state.rt.workloads.get_all(Some(&org), req.include_deleted).await?;
    Ok(ListDeploymentsResponse {
        deployments: workloads
            .iter()
            .filter(|w| w.kind == WorkloadKind::Deployment)
            .map(|w| WorkloadView::from_record(w, &state.config.base_domain))
            .collect(),
    })
}

async fn get_deployment(
    state: &AppState,
    ctx: &CallContext,
    req: GetDeploymentRequest,
) -> Result<GetDeploymentResponse, Status> {
    let w = load_deployment(state, ctx, &req.deployment_id, Permission::View).await?;
    // Drift detected on a read syncs in the background on a detached
    // system context; the response never waits for it.
    spawn_status_sync(state, w.id.clone());
    Ok(GetDeploymentResponse {
        deployment: WorkloadView::from_record(&w, &state.config.base_domain),
    })
}

pub(crate) fn spawn_status_sync(state: &AppState, id: WorkloadId) {
    let lifecycle = state.lifecycle.clone();
    tokio::spawn(async move {
        let observed = match lifecycle.registry().validate_and_refresh_observed(&id).await {
            Ok(observed) => observed,
            Err(e) => {
                tracing::debug!(workload_id = %id, error = %e, "background refresh failed");
                return;
            }
        };
        let Ok(Some(workload)) = lifecycle.runtime().workloads.get_by_id(&id).await else {
            return;
        };
        if let Err(e) = lifecycle.sync_status_from_observed(&workload, &observed).await {
            tracing::debug!(workload_id = %id, error = %e, "background status sync failed");
        }
    });
}

async fn create_deployment(
    state: &AppState,
    ctx: &CallContext,
    req: CreateDeploymentRequest,
) -> Result<CreateDeploymentResponse, Status> {
    let org = OrgId::new(req.organization_id);
    let workload = state
        .lifecycle
        .create_workload(
            ctx,
            &org,
            WorkloadKind::Deployment,
            NewWorkload {
                name: req.name,
                image: req.image,
                compose_yaml: req.compose_yaml,
                envelope: Some(sv_core::ResourceEnvelope {
                    replicas: req.replicas.unwrap_or(1),
                    memory_bytes: req.memory_bytes,
                    cpu_shares: req.cpu_shares,
                    port: req.port,
                }),
            },
        )
        .await?;
    Ok(CreateDeploymentResponse {
        deployment: WorkloadView::from_record(&workload, &state.config.base_domain),
    })
}

async fn update_deployment(
    state: &AppState,
    ctx: &CallContext,
    req: UpdateDeploymentRequest,
) -> Result<UpdateDeploymentResponse, Status> {
    let mut w = load_deployment(state, ctx, &req.deployment_id, Permission::View).await?;
    if let Some(name) = req.name {
        w.name = name;
    }
    if let Some(image) = req.image {
        w.image = Some(image).filter(|i| !i.is_empty());
    }
    if let Some(replicas) = req.replicas {
        w.envelope.replicas = replicas;
    }
    if let Some(memory) = req.memory_bytes {
        w.envelope.memory_bytes = Some(memory);
    }
    if let Some(cpu) = req.cpu_shares {
        w.envelope.cpu_shares = Some(cpu);
    }
    if let Some(port) = req.port {
        w.envelope.port = Some(port);
    }
    if let Some(groups) = req.groups {
        w.groups = groups;
    }
    if let Some(domains) = req.custom_domains {
        let parsed = domains
            .iter()
            .map(|d| CustomDomain::parse(d))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        w.custom_domains = dedupe_custom_domains(parsed);
    }
    let updated = state.lifecycle.update_workload(ctx, w).await?;
    Ok(UpdateDeploymentResponse {
        deployment: WorkloadView::from_record(&updated, &state.config.base_domain),
    })
}

async fn trigger_deployment(
    state: &AppState,
    ctx: &CallContext,
    req: TriggerDeploymentRequest,
) -> Result<TriggerDeploymentResponse, Status> {
    let id = WorkloadId::new(req.deployment_id);
    let build = state.lifecycle.trigger_build(ctx, &id).await?;
    state.lifecycle.spawn_build_run(&id, &build.id);
    Ok(TriggerDeploymentResponse { build_id: build.id.to_string(), build_number: build.number })
}

async fn revert_to_build(
    state: &AppState,
    ctx: &CallContext,
    req: RevertToBuildRequest,
) -> Result<RevertToBuildResponse, Status> {
    let id = WorkloadId::new(req.deployment_id);
    let new_build = state
        .lifecycle
        .revert_to_build(ctx, &id, &sv_core::BuildId::new(req.build_id))
        .await?;
    if let Some(build_id) = &new_build {
        state.lifecycle.spawn_build_run(&id, build_id);
    }
    // The producer may not report the new id synchronously; an empty id
    // here is within contract.
    Ok(RevertToBuildResponse {
        build_id: new_build.map(|b| b.to_string()).unwrap_or_default(),
    })
}

async fn list_builds(
    state: &AppState,
    ctx: &CallContext,
    req: ListBuildsRequest,
) -> Result<ListBuildsResponse, Status> {
    load_deployment(state, ctx, &req.deployment_id, Permission::View).await?;
    let builds = state.rt.builds.list_builds(&WorkloadId::new(req.deployment_id)).await?;
    Ok(ListBuildsResponse { builds: builds.iter().map(BuildView::from).collect() })
}

async fn get_build(
    state: &AppState,
    ctx: &CallContext,
    req: GetBuildRequest,
) -> Result<GetBuildResponse, Status> {
    let build = state
        .rt
        .builds
        .get_build(&sv_core::BuildId::new(&*req.build_id))
        .await?
        .ok_or_else(|| Status::not_found(format!("build {} not found", req.build_id)))?;
    load_deployment(state, ctx, build.workload_id.as_str(), Permission::View).await?;
    Ok(GetBuildResponse { build: BuildView::from(&build) })
}

async fn get_build_logs(
    state: &AppState,
    ctx: &CallContext,
    req: GetBuildLogsRequest,
) -> Result<GetBuildLogsResponse, Status> {
    let build = state
        .rt
        .builds
        .get_build(&sv_core::BuildId::new(&*req.build_id))
        .await?
        .ok_or_else(|| Status::not_found(format!("build {} not found", req.build_id)))?;
    load_deployment(state, ctx, build.workload_id.as_str(), Permission::View).await?;
    let lines = state.rt.build_logs_repo.get_build_logs(&build.id).await?;
    Ok(GetBuildLogsResponse {
        lines: lines.iter().map(super::streams::build_log_frame).collect(),
    })
}

async fn delete_build(
    state: &AppState,
    ctx: &CallContext,
    req: DeleteBuildRequest,
) -> Result<(), Status> {
    let build_id = sv_core::BuildId::new(&*req.build_id);
    let build = state
        .rt
        .builds
        .get_build(&build_id)
        .await?
        .ok_or_else(|| Status::not_found(format!("build {} not found", req.build_id)))?;
    load_deployment(state, ctx, build.workload_id.as_str(), Permission::Update).await?;
    state.rt.builds.delete_build(&build_id).await?;
    state.rt.build_logs_repo.delete_build_logs(&build_id).await?;
    Ok(())
}

async fn update_compose(
    state: &AppState,
    ctx: &CallContext,
    req: UpdateComposeRequest,
) -> Result<UpdateComposeResponse, Status> {
    let mut w = load_deployment(state, ctx, &req.deployment_id, Permission::View).await?;
    let validation = validate_compose(&req.compose_yaml);
    if validation.has_errors() {
        // Errors block persistence; the manifest on record is unchanged.
        return Ok(UpdateComposeResponse { validation, updated: false });
    }
    w.compose_yaml = Some(req.compose_yaml);
    w.image = None;
    state.lifecycle.update_workload(ctx, w).await?;
    Ok(UpdateComposeResponse { validation, updated: true })
}

/// Structured compose validation with the legacy single-error field.
pub(crate) fn validate_compose(yaml: &str) -> ValidateComposeResponse {
    if yaml.trim().is_empty() {
        return ValidateComposeResponse::from_diagnostics(vec![diag_error(
            "compose manifest is empty",
            1,
            1,
        )]);
    }
    match serde_yaml::from_str::<serde_yaml::Value>(yaml) {
        Err(e) => {
            let (line, column) = e
                .location()
                .map(|l| (l.line() as u32, l.column() as u32))
                .unwrap_or((1, 1));
            ValidateComposeResponse::from_diagnostics(vec![diag_error(
                &e.to_string(),
                line,
                column,
            )])
        }
        Ok(value) => {
            let mut diagnostics = Vec::new();
            match value.get("services").and_then(|s| s.as_mapping()) {
                None => diagnostics.push(diag_error("manifest has no services section", 1, 1)),
                Some(services) if services.is_empty() => {
                    diagnostics.push(diag_error("services section is empty", 1, 1))
                }
                Some(services) => {
                    for (name, body) in services {
                        let name = name.as_str().unwrap_or("?");
                        let has_image = body.get("image").and_then(|i| i.as_str()).is_some();
                        let has_build = body.get("build").is_some();
                        if !has_image && !has_build {
                            diagnostics.push(ComposeDiagnostic {
                                severity: DiagnosticSeverity::Warning,
                                message: format!(
                                    "service {name:?} declares neither image nor build"
                                ),
                                start_line: 1,
                                start_column: 1,
                                end_line: 1,
                                end_column: 1,
                            });
                        }
                    }
                }
            }
            if diagnostics.is_empty() {
                ValidateComposeResponse::ok()
            } else {
                ValidateComposeResponse::from_diagnostics(diagnostics)
            }
        }
    }
}

fn diag_error(message: &str, line: u32, column: u32) -> ComposeDiagnostic {
    ComposeDiagnostic {
        severity: DiagnosticSeverity::Error,
        message: message.to_string(),
        start_line: line,
        start_column: column,
        end_line: line,
        end_column: column,
    }
}

fn routing_view(rule: &RoutingRule) -> RoutingRuleView {
    RoutingRuleView {
        id: rule.id.clone(),
        domain: rule.domain.clone(),
        service_name: rule.service_name.clone(),
        path_prefix: rule.path_prefix.clone(),
        target_port: rule.target_port,
        protocol: rule.protocol,
        ssl_enabled: rule.ssl_enabled,
        ssl_cert_resolver: rule.ssl_cert_resolver.clone(),
        middleware_json: rule.middleware_json.clone(),
    }
}

async fn update_routings(
    state: &AppState,
    ctx: &CallContext,
    req: UpdateRoutingsRequest,
) -> Result<UpdateRoutingsResponse, Status> {
    let w = load_deployment(state, ctx, &req.deployment_id, Permission::Update).await?;
    let id = WorkloadId::new(&*req.deployment_id);
    let default_domain = w.default_domain(&state.config.base_domain);

    let mut rules = Vec::with_capacity(req.routings.len());
    for (index, view) in req.routings.iter().enumerate() {
        let mut rule = RoutingRule {
            id: if view.id.is_empty() {
                format!("rt-{}-{index}", w.id)
            } else {
                view.id.clone()
            },
            workload_id: id.clone(),
            domain: view.domain.clone(),
            service_name: view.service_name.clone(),
            path_prefix: view.path_prefix.clone(),
            target_port: view.target_port,
            protocol: view.protocol,
            ssl_enabled: view.ssl_enabled,
            ssl_cert_resolver: view.ssl_cert_resolver.clone(),
            middleware_json: view.middleware_json.clone(),
        };
        rule.normalize();
        rule.validate(&default_domain, &w.custom_domains)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        rules.push(rule);
    }
    state.rt.routings.replace_for_workload(&id, &rules).await?;
    Ok(UpdateRoutingsResponse { routings: rules.iter().map(routing_view).collect() })
}

async fn list_containers(
    state: &AppState,
    ctx: &CallContext,
    req: ListContainersRequest,
) -> Result<ListContainersResponse, Status> {
    let w = load_deployment(state, ctx, &req.deployment_id, Permission::View).await?;
    let locations = state.lifecycle.registry().validate_and_refresh(&w.id).await?;
    spawn_status_sync(state, w.id.clone());
    Ok(ListContainersResponse {
        containers: locations.iter().map(ContainerView::from).collect(),
    })
}

async fn container_op(
    state: &AppState,
    ctx: &CallContext,
    meta: &RequestMeta,
    method: &str,
    body: &Bytes,
) -> Result<Response, Status> {
    let req: ContainerOpRequest = parse_body(body)?;
    let w = load_workload(state, ctx, &req.workload_id, WorkloadKind::Deployment, Permission::View)
        .await?;

    let method_path = format!("/rpc/deployments/{method}");
    if let Some(bytes) = super::maybe_forward_unary(
        state,
        meta,
        &method_path,
        body,
        &w.id,
        req.container_id.as_deref(),
        req.service_name.as_deref(),
    )
    .await?
    {
        return Ok(super::passthrough_response(bytes));
    }

    let container = req.container_id.as_deref();
    let service = req.service_name.as_deref();
    match method {
        "StartContainer" => {
            state.lifecycle.start_container(ctx, &w.id, container, service).await?
        }
        "StopContainer" => state.lifecycle.stop_container(ctx, &w.id, container, service).await?,
        "RestartContainer" => {
            state.lifecycle.restart_container(ctx, &w.id, container, service).await?
        }
        other => return Err(Status::unimplemented(format!("unknown container op {other}"))),
    };
    // Workload-level status follows in the background.
    spawn_status_sync(state, w.id.clone());
    Ok(json_response(&ContainerOpResponse::default()))
}

#[cfg(test)]
#[path = "deployments_tests.rs"]
mod tests;
