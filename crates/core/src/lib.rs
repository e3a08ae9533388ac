// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sv-core: domain model for the Stevedore workload control plane.
//!
//! Everything in this crate is engine- and transport-agnostic: records,
//! statuses, pure parsers and classifiers, and the collaborator contracts
//! (permissions, quotas, auth context) the upper layers consume.

pub mod auth;
pub mod build;
pub mod clock;
pub mod compose;
pub mod domain;
pub mod env;
pub mod error;
pub mod id;
pub mod location;
pub mod loglevel;
pub mod logline;
pub mod metrics;
pub mod routing;
pub mod sanitize;
pub mod status;
pub mod workload;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use auth::{Allocation, CallContext, Permission, PermissionChecker, QuotaChecker, ScopedPermission};
pub use build::{BuildConfigSnapshot, BuildRecord, BuildStateError};
pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use compose::ComposeManifest;
pub use domain::{dedupe_custom_domains, CustomDomain, DomainParseError};
pub use env::EnvMap;
pub use error::{ErrorCode, NeedsBuild, Status};
pub use id::{short, BuildId, ContainerId, NodeId, OrgId, UserId, WorkloadId};
pub use location::ContainerLocation;
pub use loglevel::LogLevel;
pub use logline::{LogLine, StreamKind};
pub use metrics::{aggregate_samples, MetricSample, ResourceType};
pub use routing::{resolve_target_port, Protocol, RoutingRule, RoutingValidationError};
pub use sanitize::{sanitize_line, strip_ansi, strip_timestamps};
pub use status::{
    derive_workload_health, BuildStatus, ContainerHealth, LifecycleStatus, LocationStatus,
    WorkloadHealth,
};
pub use workload::{
    fresh_workload_id, HealthCheckSpec, ResourceEnvelope, Workload, WorkloadKind,
    WorkloadValidationError,
};
