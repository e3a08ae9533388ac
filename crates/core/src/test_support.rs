// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Record builders for tests in this crate and downstream crates.

use chrono::{DateTime, TimeZone, Utc};

use crate::build::{BuildConfigSnapshot, BuildRecord};
use crate::id::{BuildId, ContainerId, NodeId, OrgId, UserId, WorkloadId};
use crate::location::ContainerLocation;
use crate::status::{BuildStatus, LifecycleStatus, LocationStatus};
use crate::workload::{Workload, WorkloadKind};

/// Fixed instant all builders default to.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.timestamp_opt(1_722_470_400, 0).single().unwrap_or_default()
}

pub struct WorkloadBuilder {
    id: String,
    org: String,
    name: String,
    kind: WorkloadKind,
    status: LifecycleStatus,
    image: Option<String>,
    compose: Option<String>,
}

impl Default for WorkloadBuilder {
    fn default() -> Self {
        Self {
            id: "deploy-1722470400".into(),
            org: "org1".into(),
            name: "svc".into(),
            kind: WorkloadKind::Deployment,
            status: LifecycleStatus::Created,
            image: None,
            compose: None,
        }
    }
}

impl WorkloadBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn org(mut self, org: impl Into<String>) -> Self {
        self.org = org.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn kind(mut self, kind: WorkloadKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn status(mut self, status: LifecycleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn compose(mut self, yaml: impl Into<String>) -> Self {
        self.compose = Some(yaml.into());
        self
    }

    pub fn build(self) -> Workload {
        let mut w = Workload::new(
            WorkloadId::new(self.id),
            OrgId::new(self.org),
            self.name,
            UserId::new("u1"),
            self.kind,
            fixed_now(),
        );
        w.status = self.status;
        w.image = self.image;
        w.compose_yaml = self.compose;
        w
    }
}

pub struct LocationBuilder {
    workload: String,
    node: String,
    container: String,
    status: LocationStatus,
    service: Option<String>,
}

impl Default for LocationBuilder {
    fn default() -> Self {
        Self {
            workload: "deploy-1722470400".into(),
            node: "node-a".into(),
            container: "c0ffee0123456789".into(),
            status: LocationStatus::Running,
            service: None,
        }
    }
}

impl LocationBuilder {
    pub fn workload(mut self, id: impl Into<String>) -> Self {
        self.workload = id.into();
        self
    }

    pub fn node(mut self, id: impl Into<String>) -> Self {
        self.node = id.into();
        self
    }

    pub fn container(mut self, id: impl Into<String>) -> Self {
        self.container = id.into();
        self
    }

    pub fn status(mut self, status: LocationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn service(mut self, name: impl Into<String>) -> Self {
        self.service = Some(name.into());
        self
    }

    pub fn build(self) -> ContainerLocation {
        let mut loc = ContainerLocation::new(
            WorkloadId::new(self.workload),
            NodeId::new(self.node.clone()),
            format!("{}.internal", self.node),
            ContainerId::new(self.container),
            fixed_now(),
        );
        loc.status = self.status;
        loc.service_name = self.service;
        loc
    }
}

pub struct BuildRecordBuilder {
    id: String,
    workload: String,
    number: u64,
    status: BuildStatus,
    image: Option<String>,
}

impl Default for BuildRecordBuilder {
    fn default() -> Self {
        Self {
            id: "build-1".into(),
            workload: "deploy-1722470400".into(),
            number: 1,
            status: BuildStatus::Queued,
            image: None,
        }
    }
}

impl BuildRecordBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn workload(mut self, id: impl Into<String>) -> Self {
        self.workload = id.into();
        self
    }

    pub fn number(mut self, n: u64) -> Self {
        self.number = n;
        self
    }

    pub fn status(mut self, status: BuildStatus) -> Self {
        self.status = status;
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn build(self) -> BuildRecord {
        let mut b = BuildRecord::new(
            BuildId::new(self.id),
            WorkloadId::new(self.workload),
            OrgId::new("org1"),
            self.number,
            BuildConfigSnapshot::default(),
            fixed_now(),
        );
        b.status = self.status;
        b.image = self.image;
        b
    }
}
