// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sv-engine: the control-plane core.
//!
//! Lifecycle state machine, container-location reconciliation, streaming
//! substrates (build logs, live metrics, merged container logs), chunked
//! uploads, terminal sessions, and the filesystem gateway. Everything runs
//! against the adapter traits, never a concrete engine.

pub mod audit;
pub mod buildlog;
pub mod chunks;
pub mod files;
pub mod lifecycle;
pub mod locations;
pub mod logstream;
pub mod metrics;
pub mod reconcile;
pub mod runtime;
pub mod terminal;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use audit::{AuditEntry, AuditSink, TracingAuditSink};
pub use buildlog::BuildLogHub;
pub use chunks::{ChunkManager, ChunkSessionInfo};
pub use files::FilesGateway;
pub use lifecycle::{
    BuildExecutor, BuildOutcome, LifecycleEngine, NewWorkload, NullBuildExecutor, RedeployOutcome,
    RedeployStep,
};
pub use locations::LocationRegistry;
pub use logstream::{AggregatedLine, LineSplitter};
pub use metrics::{MetricsStreamer, Subscription};
pub use reconcile::{Reconciler, SweepStats};
pub use runtime::{AllowAllPermissions, Runtime, UnlimitedQuota};
pub use terminal::{GateAction, StartGate, TerminalSession, TerminalSessions};
