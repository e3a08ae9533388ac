// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Location registry: the persisted view of where a workload's containers
//! live, reconciled against engine truth on demand.

use std::sync::Arc;

use tracing::{debug, warn};

use sv_adapters::engine::{
    ContainerEngine, EngineError, EngineState, COMPOSE_SERVICE_LABEL, SERVICE_LABEL,
    WORKLOAD_LABEL,
};
use sv_core::{
    Clock, ContainerId, ContainerLocation, LocationStatus, NodeId, Status, WorkloadId,
};
use sv_storage::LocationRepository;

#[derive(Clone)]
pub struct LocationRegistry {
    engine: Arc<dyn ContainerEngine>,
    repo: Arc<dyn LocationRepository>,
    clock: Arc<dyn Clock>,
    node_id: NodeId,
    node_host: String,
}

/// A location paired with the engine state observed during refresh; `None`
/// when the engine could not be asked (transient or transport failure).
pub type ObservedLocation = (ContainerLocation, Option<EngineState>);

impl LocationRegistry {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        repo: Arc<dyn LocationRepository>,
        clock: Arc<dyn Clock>,
        node_id: NodeId,
        node_host: impl Into<String>,
    ) -> Self {
        Self { engine, repo, clock, node_id, node_host: node_host.into() }
    }

    /// Stored rows, unvalidated. May include non-running locations.
    pub async fn get_all(&self, workload: &WorkloadId) -> Result<Vec<ContainerLocation>, Status> {
        Ok(self.repo.get_all(workload).await?)
    }

    /// Reconcile stored rows with engine truth and return the observed set.
    ///
    /// Rows whose containers no longer exist are removed; containers the
    /// engine knows under the workload label but the table does not are
    /// adopted. Never invents containers.
    pub async fn validate_and_refresh_observed(
        &self,
        workload: &WorkloadId,
    ) -> Result<Vec<ObservedLocation>, Status> {
        let now = self.clock.now();
        let stored = self.repo.get_all(workload).await?;
        let mut observed: Vec<ObservedLocation> = Vec::with_capacity(stored.len());

        for mut location in stored {
            match self.engine.inspect(&location.container_id).await {
                Ok(state) => {
                    if location.status != state.status {
                        location.status = state.status;
                        location.updated_at = now;
                        self.repo
                            .update_status(workload, &location.container_id, state.status, now)
                            .await?;
                    }
                    observed.push((location, Some(state)));
                }
                Err(EngineError::NotFound(_)) => {
                    debug!(%workload, container = %location.container_id.short(12),
                        "dropping location for vanished container");
                    self.repo.remove(workload, &location.container_id).await?;
                }
                Err(EngineError::Transient) => {
                    // Restarting: keep the row, state unknown this pass.
                    observed.push((location, None));
                }
                Err(e) => {
                    warn!(%workload, error = %e, "inspect failed during refresh; keeping row");
                    observed.push((location, None));
                }
            }
        }

        // Discover containers labeled for this workload that the table
        // does not know about.
        match self.engine.list_by_label(WORKLOAD_LABEL, workload.as_str()).await {
            Ok(found) => {
                for (container_id, state) in found {
                    if observed.iter().any(|(l, _)| l.container_id == container_id) {
                        continue;
                    }
                    let mut location = ContainerLocation::new(
                        workload.clone(),
                        self.node_id.clone(),
                        self.node_host.clone(),
                        container_id,
                        now,
                    );
                    location.status = state.status;
                    location.service_name = service_name_from_labels(&state);
                    self.repo.upsert(&location).await?;
                    observed.push((location, Some(state)));
                }
            }
            Err(e) => warn!(%workload, error = %e, "label discovery failed during refresh"),
        }

        Ok(observed)
    }

    /// [`Self::validate_and_refresh_observed`] without the engine states.
    pub async fn validate_and_refresh(
        &self,
        workload: &WorkloadId,
    ) -> Result<Vec<ContainerLocation>, Status> {
        Ok(self
            .validate_and_refresh_observed(workload)
            .await?
            .into_iter()
            .map(|(l, _)| l)
            .collect())
    }

    /// Locate one container for an operation.
    ///
    /// Matching order: explicit container id (case-insensitive, prefix in
    /// either direction) → service name label, preferring a running one →
    /// any running → the first location.
    pub async fn find(
        &self,
        workload: &WorkloadId,
        container_id: Option<&str>,
        service_name: Option<&str>,
        prefer_running: bool,
    ) -> Result<ContainerLocation, Status> {
        let locations = self.repo.get_all(workload).await?;
        if locations.is_empty() {
            return Err(Status::not_found(format!("no containers for workload {workload}")));
        }

        if let Some(requested) = container_id.filter(|c| !c.is_empty()) {
            return locations
                .iter()
                .find(|l| l.container_id.matches(requested))
                .cloned()
                .filter(known_node)
                .ok_or_else(|| {
                    Status::not_found(format!("container {requested} not found for {workload}"))
                });
        }

        if let Some(service) = service_name.filter(|s| !s.is_empty()) {
            let mut matching: Vec<&ContainerLocation> = locations
                .iter()
                .filter(|l| l.service_name.as_deref() == Some(service))
                .collect();
            // Labels on the engine side win when the table has no service
            // column for the row.
            if matching.is_empty() {
                for location in &locations {
                    if let Ok(state) = self.engine.inspect(&location.container_id).await {
                        let labeled = state.labels.get(SERVICE_LABEL).map(String::as_str)
                            == Some(service)
                            || state.labels.get(COMPOSE_SERVICE_LABEL).map(String::as_str)
                                == Some(service);
                        if labeled {
                            matching.push(location);
                        }
                    }
                }
            }
            if let Some(found) =
                matching.iter().find(|l| l.is_running()).or_else(|| matching.first())
            {
                let found = (*found).clone();
                if known_node(&found) {
                    return Ok(found);
                }
            }
            return Err(Status::not_found(format!(
                "service {service} not found for workload {workload}"
            )));
        }

        let chosen = if prefer_running {
            locations.iter().find(|l| l.is_running()).or_else(|| locations.first())
        } else {
            locations.first()
        };
        chosen
            .cloned()
            .filter(known_node)
            .ok_or_else(|| Status::not_found(format!("no usable container for {workload}")))
    }

    pub async fn update_status(
        &self,
        workload: &WorkloadId,
        container: &ContainerId,
        status: LocationStatus,
    ) -> Result<(), Status> {
        Ok(self.repo.update_status(workload, container, status, self.clock.now()).await?)
    }
}

fn known_node(location: &ContainerLocation) -> bool {
    !location.node_id.is_empty()
}

fn service_name_from_labels(state: &EngineState) -> Option<String> {
    state
        .labels
        .get(SERVICE_LABEL)
        .or_else(|| state.labels.get(COMPOSE_SERVICE_LABEL))
        .cloned()
}

#[cfg(test)]
#[path = "locations_tests.rs"]
mod tests;
