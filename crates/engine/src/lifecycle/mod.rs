// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workload lifecycle state machine.
//!
//! Created → Building → Deploying → Running → Stopped/Failed, with
//! restart, revert-to-build, and the automatic redeployment ladder the
//! reconciler leans on. Permission and quota checks run at entry; engine
//! calls on the happy path are not retried (the reconciler is the
//! recovery loop).

mod redeploy;

pub use redeploy::{redeploy_plan, RedeployOutcome, RedeployStep};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use sv_adapters::engine::{CreateContainerSpec, EngineError, SERVICE_LABEL, WORKLOAD_LABEL};
use sv_core::{
    fresh_workload_id, resolve_target_port, Allocation, BuildId, BuildRecord, BuildStatus,
    CallContext, ComposeManifest, ContainerId, ContainerLocation, LifecycleStatus,
    LocationStatus, NeedsBuild, OrgId, Permission, ResourceEnvelope, ResourceType,
    ScopedPermission, Status, Workload, WorkloadId, WorkloadKind,
};

use crate::buildlog::BuildLogHub;
use crate::locations::{LocationRegistry, ObservedLocation};
use crate::runtime::Runtime;

/// Grace timeout for stop/restart, in seconds.
pub const STOP_GRACE_SECS: u32 = 30;

/// Result of a build executor run.
#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    pub image: Option<String>,
    pub compose_yaml: Option<String>,
    pub size_bytes: Option<u64>,
}

/// External builder contract. The core triggers builds and streams their
/// logs; executing them is someone else's job.
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    async fn execute(
        &self,
        workload: &Workload,
        build: &BuildRecord,
        logs: &BuildLogHub,
    ) -> Result<BuildOutcome, Status>;
}

/// Executor used when no builder is wired up; every source build fails.
#[derive(Debug, Clone, Default)]
pub struct NullBuildExecutor;

#[async_trait]
impl BuildExecutor for NullBuildExecutor {
    async fn execute(
        &self,
        _workload: &Workload,
        _build: &BuildRecord,
        _logs: &BuildLogHub,
    ) -> Result<BuildOutcome, Status> {
        Err(Status::failed_precondition("no build executor configured"))
    }
}

/// Fields a caller provides at workload creation.
#[derive(Debug, Clone, Default)]
pub struct NewWorkload {
    pub name: String,
    pub image: Option<String>,
    pub compose_yaml: Option<String>,
    pub envelope: Option<ResourceEnvelope>,
}

#[derive(Clone)]
pub struct LifecycleEngine {
    rt: Runtime,
    registry: LocationRegistry,
}

impl LifecycleEngine {
    pub fn new(rt: Runtime) -> Self {
        let registry = LocationRegistry::new(
            Arc::clone(&rt.engine),
            Arc::clone(&rt.locations_repo),
            Arc::clone(&rt.clock),
            rt.node_id.clone(),
            rt.node_host.clone(),
        );
        Self { rt, registry }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }

    pub fn registry(&self) -> &LocationRegistry {
        &self.registry
    }

    fn resource_type(kind: WorkloadKind) -> ResourceType {
        match kind {
            WorkloadKind::Deployment => ResourceType::Deployment,
            WorkloadKind::GameServer => ResourceType::Gameserver,
        }
    }

    async fn load(&self, id: &WorkloadId) -> Result<Workload, Status> {
        self.rt
            .workloads
            .get_by_id(id)
            .await?
            .filter(|w| !w.is_deleted())
            .ok_or_else(|| Status::not_found(format!("workload {id} not found")))
    }

    async fn check(
        &self,
        ctx: &CallContext,
        workload: &Workload,
        permission: Permission,
    ) -> Result<(), Status> {
        let scoped = ScopedPermission::new(permission, Self::resource_type(workload.kind))
            .on(workload.id.to_string());
        self.rt.check_permission(ctx, &workload.org_id, &scoped).await
    }

    // --- creation / update / deletion ---

    pub async fn create_workload(
        &self,
        ctx: &CallContext,
        org: &OrgId,
        kind: WorkloadKind,
        spec: NewWorkload,
    ) -> Result<Workload, Status> {
        let scoped = ScopedPermission::new(Permission::Create, Self::resource_type(kind));
        self.rt.check_permission(ctx, org, &scoped).await?;

        let envelope = spec
            .envelope
            .unwrap_or(ResourceEnvelope { replicas: 1, ..ResourceEnvelope::default() });
        self.rt
            .check_quota(
                ctx,
                org,
                &Allocation {
                    replicas: envelope.replicas.max(1),
                    memory_bytes: envelope.memory_bytes.unwrap_or(0),
                    cpu_shares: envelope.cpu_shares.unwrap_or(0),
                },
            )
            .await?;

        let user = ctx.user_opt().cloned().unwrap_or_else(|| sv_core::UserId::new("system"));
        let now = self.rt.clock.now();

        // Ids embed the creation unix second; on collision, walk forward.
        let mut workload = None;
        for bump in 0..5i64 {
            let id = fresh_workload_id(kind, now.timestamp() + bump);
            let mut candidate =
                Workload::new(id, org.clone(), spec.name.clone(), user.clone(), kind, now);
            candidate.envelope = envelope.clone();
            candidate.image = spec.image.clone().filter(|i| !i.is_empty());
            candidate.compose_yaml = spec.compose_yaml.clone().filter(|c| !c.trim().is_empty());
            candidate.validate().map_err(|e| Status::invalid_argument(e.to_string()))?;
            match self.rt.workloads.create(&candidate).await {
                Ok(()) => {
                    workload = Some(candidate);
                    break;
                }
                Err(sv_storage::StorageError::Conflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        let workload =
            workload.ok_or_else(|| Status::internal("could not allocate a workload id"))?;
        info!(workload_id = %workload.id, org = %org, "created workload");
        Ok(workload)
    }

    pub async fn update_workload(
        &self,
        ctx: &CallContext,
        updated: Workload,
    ) -> Result<Workload, Status> {
        let current = self.load(&updated.id).await?;
        self.check(ctx, &current, Permission::Update).await?;
        updated.validate().map_err(|e| Status::invalid_argument(e.to_string()))?;

        // A raised envelope re-enters quota review.
        if current.envelope.raised_by(&updated.envelope) {
            self.rt
                .check_quota(
                    ctx,
                    &current.org_id,
                    &Allocation {
                        replicas: updated.envelope.replicas.max(1),
                        memory_bytes: updated.envelope.memory_bytes.unwrap_or(0),
                        cpu_shares: updated.envelope.cpu_shares.unwrap_or(0),
                    },
                )
                .await?;
        }

        let mut updated = updated;
        updated.updated_at = self.rt.clock.now();
        self.rt.workloads.update(&updated).await?;
        Ok(updated)
    }

    /// Soft-delete and tear down containers.
    pub async fn delete_workload(&self, ctx: &CallContext, id: &WorkloadId) -> Result<(), Status> {
        let workload = self.load(id).await?;
        self.check(ctx, &workload, Permission::Delete).await?;

        for location in self.registry.get_all(id).await? {
            if let Err(e) = self.rt.engine.stop(&location.container_id, STOP_GRACE_SECS).await {
                if !matches!(e, EngineError::NotFound(_)) {
                    warn!(workload_id = %id, error = %e, "stop during delete failed");
                }
            }
            if let Err(e) = self.rt.engine.remove(&location.container_id, true).await {
                if !matches!(e, EngineError::NotFound(_)) {
                    warn!(workload_id = %id, error = %e, "remove during delete failed");
                }
            }
        }
        self.rt.locations_repo.remove_all(id).await?;
        self.rt.workloads.delete(id, self.rt.clock.now()).await?;
        info!(workload_id = %id, "deleted workload");
        Ok(())
    }

    // --- builds ---

    /// Queue a build and return its record; the build itself runs on a
    /// detached task.
    pub async fn trigger_build(
        &self,
        ctx: &CallContext,
        id: &WorkloadId,
    ) -> Result<BuildRecord, Status> {
        let workload = self.load(id).await?;
        self.check(ctx, &workload, Permission::Update).await?;
        if matches!(workload.status, LifecycleStatus::Building | LifecycleStatus::Deploying) {
            return Err(Status::failed_precondition(format!(
                "workload {id} is already {}",
                workload.status
            )));
        }

        let number = self.rt.builds.next_build_number(id).await?;
        let mut build = BuildRecord::new(
            BuildId::generate(),
            id.clone(),
            workload.org_id.clone(),
            number,
            workload.build_config.clone(),
            self.rt.clock.now(),
        );
        build.triggered_by = ctx.user_opt().map(|u| u.to_string());
        self.rt.builds.create(&build).await?;
        self.rt
            .workloads
            .update_status(id, LifecycleStatus::Building, self.rt.clock.now())
            .await?;
        self.rt.build_logs.begin_build(id, &build.id);
        Ok(build)
    }

    /// Detach the build run onto its own task. Callers pair this with
    /// [`Self::trigger_build`]; tests drive [`Self::run_build`] directly.
    pub fn spawn_build_run(&self, id: &WorkloadId, build_id: &BuildId) {
        let engine = self.clone();
        let build_id = build_id.clone();
        let workload_id = id.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run_build(&workload_id, &build_id).await {
                warn!(workload_id = %workload_id, build_id = %build_id, error = %e,
                    "build run failed");
            }
        });
    }

    /// Execute one queued build to completion, deploying on success.
    /// Public so tests (and synchronous callers) can drive it directly.
    pub async fn run_build(&self, id: &WorkloadId, build_id: &BuildId) -> Result<(), Status> {
        let workload = self.load(id).await?;
        let mut build = self
            .rt
            .builds
            .get_build(build_id)
            .await?
            .ok_or_else(|| Status::not_found(format!("build {build_id} not found")))?;
        let logs = &self.rt.build_logs;

        logs.write(id, sv_core::StreamKind::Stdout, &format!("starting build #{}", build.number));
        build.advance(BuildStatus::Preparing).map_err(|e| Status::internal(e.to_string()))?;
        self.rt.builds.update(&build).await?;
        build.advance(BuildStatus::Building).map_err(|e| Status::internal(e.to_string()))?;
        self.rt.builds.update(&build).await?;

        let outcome = if build.config.has_source() {
            self.rt.build_executor.execute(&workload, &build, logs).await
        } else if workload.is_compose() {
            Ok(BuildOutcome { compose_yaml: workload.compose_yaml.clone(), ..Default::default() })
        } else if workload.image.as_deref().is_some_and(|i| !i.is_empty()) {
            Ok(BuildOutcome { image: workload.image.clone(), ..Default::default() })
        } else {
            Err(Status::failed_precondition("deployment needs to be built: no image or repository configured"))
        };

        let now = self.rt.clock.now();
        match outcome {
            Ok(outcome) => {
                build.image = outcome.image.clone();
                build.compose_yaml = outcome.compose_yaml.clone();
                build.size_bytes = outcome.size_bytes;
                build
                    .complete(BuildStatus::Success, None, now)
                    .map_err(|e| Status::internal(e.to_string()))?;
                self.rt.builds.update(&build).await?;
                logs.write(id, sv_core::StreamKind::Stdout, "build succeeded");
                logs.end_build(id);

                // Adopt the produced artifacts and roll into deployment.
                let mut workload = self.load(id).await?;
                if outcome.image.is_some() {
                    workload.image = outcome.image;
                    workload.compose_yaml = None;
                } else if outcome.compose_yaml.is_some() {
                    workload.compose_yaml = outcome.compose_yaml;
                }
                self.rt.workloads.update(&workload).await?;
                self.deploy_internal(&workload).await
            }
            Err(e) => {
                logs.write_stderr(id, &format!("build failed: {}", e.message));
                logs.end_build(id);
                build
                    .complete(BuildStatus::Failed, Some(e.message.clone()), now)
                    .map_err(|e| Status::internal(e.to_string()))?;
                self.rt.builds.update(&build).await?;
                self.rt.workloads.update_status(id, LifecycleStatus::Failed, now).await?;
                Err(e)
            }
        }
    }

    /// Revert the workload's build configuration to a past successful
    /// build and trigger a fresh build from it.
    pub async fn revert_to_build(
        &self,
        ctx: &CallContext,
        id: &WorkloadId,
        build_id: &BuildId,
    ) -> Result<Option<BuildId>, Status> {
        let mut workload = self.load(id).await?;
        self.check(ctx, &workload, Permission::Update).await?;
        if !matches!(workload.status, LifecycleStatus::Running | LifecycleStatus::Stopped) {
            return Err(Status::failed_precondition(format!(
                "cannot revert while workload is {}",
                workload.status
            )));
        }

        let build = self
            .rt
            .builds
            .get_build(build_id)
            .await?
            .filter(|b| &b.workload_id == id)
            .ok_or_else(|| Status::not_found(format!("build {build_id} not found")))?;
        if build.status != BuildStatus::Success {
            return Err(Status::failed_precondition(format!(
                "build #{} is {}, only successful builds can be reverted to",
                build.number, build.status
            )));
        }

        workload.build_config = build.config.clone();
        workload.updated_at = self.rt.clock.now();
        self.rt.workloads.update(&workload).await?;

        let new_build = self.trigger_build(ctx, id).await?;
        Ok(Some(new_build.id))
    }

    // --- deployment and container control ---

    /// Deploy (or redeploy) the workload's containers from its manifest or
    /// image.
    pub async fn deploy(&self, ctx: &CallContext, id: &WorkloadId) -> Result<(), Status> {
        let workload = self.load(id).await?;
        self.check(ctx, &workload, Permission::Update).await?;
        self.deploy_internal(&workload).await
    }

    async fn deploy_internal(&self, workload: &Workload) -> Result<(), Status> {
        let id = &workload.id;
        let now = self.rt.clock.now();
        self.rt.workloads.update_status(id, LifecycleStatus::Deploying, now).await?;

        // Old containers go away first; a redeploy is not an upgrade dance.
        for location in self.registry.get_all(id).await? {
            let _ = self.rt.engine.stop(&location.container_id, STOP_GRACE_SECS).await;
            let _ = self.rt.engine.remove(&location.container_id, true).await;
            self.rt.locations_repo.remove(id, &location.container_id).await?;
        }

        let result = if workload.is_compose() {
            self.deploy_compose(workload).await
        } else if workload.image.as_deref().is_some_and(|i| !i.is_empty()) {
            self.deploy_image(workload).await
        } else {
            Err(Status::failed_precondition("deployment needs to be built: nothing to deploy"))
        };

        let now = self.rt.clock.now();
        match result {
            Ok(all_running) => {
                let status =
                    if all_running { LifecycleStatus::Running } else { LifecycleStatus::Failed };
                self.rt.workloads.update_status(id, status, now).await?;
                let mut updated = self.load(id).await?;
                updated.last_deployed_at = Some(now);
                self.rt.workloads.update(&updated).await?;
                if status == LifecycleStatus::Failed {
                    return Err(Status::internal("not all containers reached running"));
                }
                Ok(())
            }
            Err(e) => {
                self.rt.workloads.update_status(id, LifecycleStatus::Failed, now).await?;
                Err(e)
            }
        }
    }

    fn base_labels(&self, workload: &Workload) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert(WORKLOAD_LABEL.to_string(), workload.id.to_string());
        labels
    }

    async fn record_location(
        &self,
        workload: &Workload,
        container: ContainerId,
        service: Option<String>,
        host_port: Option<u16>,
        running: bool,
    ) -> Result<(), Status> {
        let mut location = ContainerLocation::new(
            workload.id.clone(),
            self.rt.node_id.clone(),
            self.rt.node_host.clone(),
            container,
            self.rt.clock.now(),
        );
        location.service_name = service;
        location.host_port = host_port;
        location.status =
            if running { LocationStatus::Running } else { LocationStatus::Created };
        Ok(self.rt.locations_repo.upsert(&location).await?)
    }

    /// Returns whether every container reached running.
    async fn deploy_compose(&self, workload: &Workload) -> Result<bool, Status> {
        let yaml = workload.compose_yaml.clone().unwrap_or_default();
        let manifest = ComposeManifest::new(yaml);
        let services = manifest.service_images();
        if services.is_empty() {
            return Err(Status::invalid_argument("compose manifest declares no services"));
        }

        let mut all_running = true;
        for (service, image) in services {
            let Some(image) = image else {
                warn!(workload_id = %workload.id, service = %service,
                    "compose service has no static image; skipping");
                all_running = false;
                continue;
            };
            let mut labels = self.base_labels(workload);
            labels.insert(SERVICE_LABEL.to_string(), service.clone());
            let spec = CreateContainerSpec {
                name: format!("{}-{}", workload.id, service),
                image,
                env: workload.env.to_engine_pairs(),
                labels,
                memory_bytes: workload.envelope.memory_bytes,
                cpu_shares: workload.envelope.cpu_shares,
                ..Default::default()
            };
            let container = self.rt.engine.create(&spec).await.map_err(Status::from)?;
            let running = match self.rt.engine.start(&container).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(workload_id = %workload.id, service = %service, error = %e,
                        "compose service failed to start");
                    false
                }
            };
            all_running &= running;
            self.record_location(workload, container, Some(service), None, running).await?;
        }
        Ok(all_running)
    }

    async fn deploy_image(&self, workload: &Workload) -> Result<bool, Status> {
        let image = workload.image.clone().unwrap_or_default();
        let rules = self.rt.routings.get_for_workload(&workload.id).await?;
        let port = resolve_target_port(&rules, None, workload.envelope.port);

        let replicas = workload.envelope.replicas.max(1);
        let mut all_running = true;
        for index in 0..replicas {
            let spec = CreateContainerSpec {
                name: format!("{}-{}", workload.id, index),
                image: image.clone(),
                env: workload.env.to_engine_pairs(),
                labels: self.base_labels(workload),
                container_port: Some(port),
                memory_bytes: workload.envelope.memory_bytes,
                cpu_shares: workload.envelope.cpu_shares,
                tty: workload.kind == WorkloadKind::GameServer,
                open_stdin: workload.kind == WorkloadKind::GameServer,
                ..Default::default()
            };
            let container = self.rt.engine.create(&spec).await.map_err(Status::from)?;
            let running = match self.rt.engine.start(&container).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(workload_id = %workload.id, error = %e, "container failed to start");
                    false
                }
            };
            all_running &= running;
            self.record_location(workload, container, None, Some(port), running).await?;
        }
        Ok(all_running)
    }

    /// Start a stopped workload: existing containers if any, else the
    /// redeploy ladder.
    pub async fn start(&self, ctx: &CallContext, id: &WorkloadId) -> Result<(), Status> {
        let workload = self.load(id).await?;
        self.check(ctx, &workload, Permission::Manage).await?;
        let now = self.rt.clock.now();
        self.rt.workloads.update_status(id, LifecycleStatus::Deploying, now).await?;

        let locations = self.registry.validate_and_refresh(id).await?;
        if locations.is_empty() {
            return match self.auto_redeploy(ctx, id).await {
                Ok(_) => Ok(()),
                Err(e) => {
                    self.rt
                        .workloads
                        .update_status(id, LifecycleStatus::Failed, self.rt.clock.now())
                        .await?;
                    Err(e)
                }
            };
        }

        let mut any_failed = false;
        for location in &locations {
            if let Err(e) = self.rt.engine.start(&location.container_id).await {
                warn!(workload_id = %id, error = %e, "start failed");
                any_failed = true;
            } else {
                self.registry
                    .update_status(id, &location.container_id, LocationStatus::Running)
                    .await?;
            }
        }
        let status = if any_failed { LifecycleStatus::Failed } else { LifecycleStatus::Running };
        self.rt.workloads.update_status(id, status, self.rt.clock.now()).await?;
        if any_failed {
            Err(Status::internal("one or more containers failed to start"))
        } else {
            Ok(())
        }
    }

    /// Stop every container with the grace timeout.
    pub async fn stop(&self, ctx: &CallContext, id: &WorkloadId) -> Result<(), Status> {
        let workload = self.load(id).await?;
        self.check(ctx, &workload, Permission::Manage).await?;

        for location in self.registry.get_all(id).await? {
            match self.rt.engine.stop(&location.container_id, STOP_GRACE_SECS).await {
                Ok(()) => {
                    self.registry
                        .update_status(id, &location.container_id, LocationStatus::Stopped)
                        .await?;
                }
                Err(EngineError::NotFound(_)) => {
                    self.rt.locations_repo.remove(id, &location.container_id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.rt
            .workloads
            .update_status(id, LifecycleStatus::Stopped, self.rt.clock.now())
            .await?;
        Ok(())
    }

    /// Stop-then-start; the workload remains Running on success.
    pub async fn restart(&self, ctx: &CallContext, id: &WorkloadId) -> Result<(), Status> {
        let workload = self.load(id).await?;
        self.check(ctx, &workload, Permission::Manage).await?;

        for location in self.registry.get_all(id).await? {
            self.rt
                .engine
                .restart(&location.container_id, STOP_GRACE_SECS)
                .await
                .map_err(Status::from)?;
            self.registry
                .update_status(id, &location.container_id, LocationStatus::Running)
                .await?;
        }
        self.rt
            .workloads
            .update_status(id, LifecycleStatus::Running, self.rt.clock.now())
            .await?;
        Ok(())
    }

    /// Single-container control for the container-level RPCs.
    pub async fn start_container(
        &self,
        ctx: &CallContext,
        id: &WorkloadId,
        container_id: Option<&str>,
        service_name: Option<&str>,
    ) -> Result<ContainerId, Status> {
        let workload = self.load(id).await?;
        self.check(ctx, &workload, Permission::Manage).await?;
        let location = self.registry.find(id, container_id, service_name, false).await?;
        self.rt.engine.start(&location.container_id).await.map_err(Status::from)?;
        self.registry.update_status(id, &location.container_id, LocationStatus::Running).await?;
        Ok(location.container_id)
    }

    pub async fn stop_container(
        &self,
        ctx: &CallContext,
        id: &WorkloadId,
        container_id: Option<&str>,
        service_name: Option<&str>,
    ) -> Result<ContainerId, Status> {
        let workload = self.load(id).await?;
        self.check(ctx, &workload, Permission::Manage).await?;
        let location = self.registry.find(id, container_id, service_name, true).await?;
        self.rt
            .engine
            .stop(&location.container_id, STOP_GRACE_SECS)
            .await
            .map_err(Status::from)?;
        self.registry.update_status(id, &location.container_id, LocationStatus::Stopped).await?;
        Ok(location.container_id)
    }

    pub async fn restart_container(
        &self,
        ctx: &CallContext,
        id: &WorkloadId,
        container_id: Option<&str>,
        service_name: Option<&str>,
    ) -> Result<ContainerId, Status> {
        let workload = self.load(id).await?;
        self.check(ctx, &workload, Permission::Manage).await?;
        let location = self.registry.find(id, container_id, service_name, true).await?;
        self.rt
            .engine
            .restart(&location.container_id, STOP_GRACE_SECS)
            .await
            .map_err(Status::from)?;
        self.registry.update_status(id, &location.container_id, LocationStatus::Running).await?;
        Ok(location.container_id)
    }

    // --- automatic redeployment ---

    /// Recovery ladder for workloads that should be running but have no
    /// usable containers. Invoked by the reconciler (system context) and
    /// by operations that discover an empty location set.
    pub async fn auto_redeploy(
        &self,
        ctx: &CallContext,
        id: &WorkloadId,
    ) -> Result<RedeployOutcome, Status> {
        let workload = self.load(id).await?;
        self.check(ctx, &workload, Permission::Manage).await?;

        let existing = self.registry.get_all(id).await?;
        let has_image = workload.image.as_deref().is_some_and(|i| !i.is_empty());
        let plan = redeploy_plan(!existing.is_empty(), workload.is_compose(), has_image);

        for step in plan {
            match step {
                RedeployStep::StartExisting => {
                    let mut started = 0;
                    for location in &existing {
                        match self.rt.engine.start(&location.container_id).await {
                            Ok(()) => {
                                started += 1;
                                self.registry
                                    .update_status(
                                        id,
                                        &location.container_id,
                                        LocationStatus::Running,
                                    )
                                    .await?;
                            }
                            Err(e) => {
                                warn!(workload_id = %id, error = %e,
                                    "auto-redeploy: existing container would not start");
                            }
                        }
                    }
                    if started > 0 {
                        self.rt
                            .workloads
                            .update_status(id, LifecycleStatus::Running, self.rt.clock.now())
                            .await?;
                        info!(workload_id = %id, started, "auto-redeploy started existing containers");
                        return Ok(RedeployOutcome::StartedExisting);
                    }
                }
                RedeployStep::ComposeRedeploy => {
                    self.deploy_internal(&workload).await?;
                    info!(workload_id = %id, "auto-redeploy redeployed compose manifest");
                    return Ok(RedeployOutcome::Redeployed);
                }
                RedeployStep::ImageCreate => {
                    return match self.deploy_internal(&workload).await {
                        Ok(()) => {
                            info!(workload_id = %id, "auto-redeploy recreated containers");
                            Ok(RedeployOutcome::Redeployed)
                        }
                        Err(e) if is_image_missing(&e) => {
                            Err(self.needs_build_error(id, e.message.clone()).await)
                        }
                        Err(e) => Err(e),
                    };
                }
                RedeployStep::NeedsBuild => {
                    return Err(self
                        .needs_build_error(id, "deployment needs to be built".to_string())
                        .await);
                }
            }
        }
        Err(Status::internal("redeploy plan was empty"))
    }

    /// Build the structured needs-build error, asynchronously triggering a
    /// rebuild when a successful build exists.
    async fn needs_build_error(&self, id: &WorkloadId, message: String) -> Status {
        let latest = self.rt.builds.latest_successful(id).await.ok().flatten();
        let rebuild_triggered = if latest.is_some() {
            let engine = self.clone();
            let workload_id = id.clone();
            tokio::spawn(async move {
                let ctx = CallContext::system();
                match engine.trigger_build(&ctx, &workload_id).await {
                    Ok(build) => engine.spawn_build_run(&workload_id, &build.id),
                    Err(e) => {
                        warn!(workload_id = %workload_id, error = %e,
                            "async rebuild trigger failed")
                    }
                }
            });
            true
        } else {
            false
        };
        Status::failed_precondition(message).with_needs_build(NeedsBuild {
            build_id: latest.as_ref().map(|b| b.id.clone()),
            build_number: latest.as_ref().map(|b| b.number),
            rebuild_triggered,
        })
    }

    // --- status synchronization ---

    /// Drive the stored lifecycle status toward what the engine reports.
    /// Shared by the reconciler and by read-path drift detection.
    pub async fn sync_status_from_observed(
        &self,
        workload: &Workload,
        observed: &[ObservedLocation],
    ) -> Result<(), Status> {
        let now = self.rt.clock.now();
        let total = observed.len();
        let running = observed.iter().filter(|(l, _)| l.is_running()).count();

        match workload.kind {
            WorkloadKind::Deployment => {
                if total > 0
                    && running == 0
                    && !matches!(
                        workload.status,
                        LifecycleStatus::Building | LifecycleStatus::Deploying
                    )
                    && workload.status == LifecycleStatus::Running
                {
                    self.rt
                        .workloads
                        .update_status(&workload.id, LifecycleStatus::Stopped, now)
                        .await?;
                } else if running > 0 && workload.status == LifecycleStatus::Stopped {
                    self.rt
                        .workloads
                        .update_status(&workload.id, LifecycleStatus::Running, now)
                        .await?;
                }
            }
            WorkloadKind::GameServer => {
                // Exit code decides between clean stop and failure.
                if running > 0 {
                    if workload.status != LifecycleStatus::Running {
                        self.rt
                            .workloads
                            .update_status(&workload.id, LifecycleStatus::Running, now)
                            .await?;
                    }
                } else if let Some((_, Some(state))) =
                    observed.iter().find(|(_, s)| s.is_some())
                {
                    let next = match state.exit_code {
                        Some(0) | None => LifecycleStatus::Stopped,
                        Some(_) => LifecycleStatus::Failed,
                    };
                    if workload.status != next
                        && !matches!(
                            workload.status,
                            LifecycleStatus::Building | LifecycleStatus::Deploying
                        )
                    {
                        self.rt.workloads.update_status(&workload.id, next, now).await?;
                    }
                }
            }
        }

        // Health rolls up from container probes.
        let healths: Vec<_> = observed
            .iter()
            .filter_map(|(_, s)| s.as_ref().map(|s| s.health))
            .collect();
        let health = sv_core::derive_workload_health(&healths);
        if health != workload.health {
            self.rt.workloads.update_health(&workload.id, health).await?;
        }
        Ok(())
    }
}

/// Engine "image not found" detection for the needs-build flow.
fn is_image_missing(status: &Status) -> bool {
    let msg = status.message.to_ascii_lowercase();
    msg.contains("no such image") || msg.contains("image not found")
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
