// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sv-storage: persistence contracts.
//!
//! The relational store owns workloads, builds, locations and routing
//! rules; the time-series store owns build logs and metric history. Both
//! are consumed through the traits here. [`MemoryStore`] implements the
//! whole set for tests and single-node development.

pub mod columns;
pub mod error;
pub mod memory;
pub mod repo;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use repo::{
    BuildHistoryRepository, BuildLogsRepository, LocationRepository, MetricsRepository,
    NodeRecord, NodeRepository, RoutingRepository, WorkloadRepository,
};
