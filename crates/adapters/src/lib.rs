// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sv-adapters: the boundary to everything outside the process.
//!
//! The container engine facade (Docker over bollard), host-side volume
//! filesystem access, and the cross-node request forwarder. Higher layers
//! only see the traits defined here.

pub mod engine;
pub mod forward;
pub mod pathsafe;
pub mod volumes;
pub mod ws;

pub use engine::{
    AttachChunk, AttachStreams, ContainerEngine, CreateContainerSpec, DockerEngine, EngineError,
    EngineEvent, EngineEventKind, EngineState, ExecOutput, LogsRequest, MountInfo, StatsSample,
};
#[cfg(any(test, feature = "test-support"))]
pub use engine::fake::FakeEngine;
pub use forward::{ForwardError, ForwardTarget, NodeDirectory, NodeForwarder, StaticNodeDirectory};
pub use pathsafe::{normalize_path, resolve_within_root, PathError};
pub use volumes::VolumeFs;
