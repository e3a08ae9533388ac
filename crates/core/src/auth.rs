// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborator contracts: authentication context, scoped permissions,
//! quota checks. Implemented outside this crate; everything here is the
//! seam the core consumes.

use async_trait::async_trait;

use crate::error::Status;
use crate::id::{OrgId, UserId};
use crate::metrics::ResourceType;

/// Permission verbs used by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    View,
    Read,
    Update,
    Manage,
    Create,
    Delete,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Read => "read",
            Self::Update => "update",
            Self::Manage => "manage",
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }
}

/// A scoped permission request.
#[derive(Debug, Clone)]
pub struct ScopedPermission {
    pub permission: Permission,
    pub resource_type: ResourceType,
    /// None means "any resource of this type in the organization".
    pub resource_id: Option<String>,
}

impl ScopedPermission {
    pub fn new(permission: Permission, resource_type: ResourceType) -> Self {
        Self { permission, resource_type, resource_id: None }
    }

    pub fn on(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }
}

/// Requested resource allocation for quota evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Allocation {
    pub replicas: u32,
    pub memory_bytes: u64,
    pub cpu_shares: u32,
}

#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Ok when the calling context holds the permission, otherwise a
    /// `PermissionDenied` status.
    async fn check_scoped(
        &self,
        ctx: &CallContext,
        org_id: &OrgId,
        scoped: &ScopedPermission,
    ) -> Result<(), Status>;
}

#[async_trait]
pub trait QuotaChecker: Send + Sync {
    /// Ok when the organization plan covers the allocation, otherwise a
    /// `FailedPrecondition` status.
    async fn can_allocate(
        &self,
        org_id: &OrgId,
        allocation: &Allocation,
    ) -> Result<(), Status>;
}

/// Per-call identity and client metadata, threaded through every
/// operation. Background work runs on a detached system context that
/// bypasses permission checks.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    user: Option<UserId>,
    system: bool,
    pub token: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl CallContext {
    pub fn for_user(user: UserId) -> Self {
        Self { user: Some(user), ..Self::default() }
    }

    /// Internal context for reconciler sweeps and detached side effects.
    pub fn system() -> Self {
        Self { user: None, system: true, ..Self::default() }
    }

    pub fn is_system(&self) -> bool {
        self.system
    }

    /// The authenticated user, or `Unauthenticated`.
    pub fn user(&self) -> Result<&UserId, Status> {
        self.user.as_ref().ok_or_else(|| Status::unauthenticated("no authenticated user"))
    }

    pub fn user_opt(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_client(mut self, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.client_ip = ip;
        self.user_agent = user_agent;
        self
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
