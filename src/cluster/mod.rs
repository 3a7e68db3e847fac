//! Control-plane capabilities
//!
//! The inspector and the executor never talk to a concrete client; they
//! depend on [`ControlPlane`], which the kube adapter implements against a
//! live cluster.

pub mod live;

pub use live::KubeControlPlane;

use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{Node, PersistentVolumeClaim, Pod};
use k8s_openapi::api::storage::v1::StorageClass;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Object kinds the remediation engine reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    PersistentVolumeClaim,
    Pod,
    Deployment,
    Service,
    ConfigMap,
    StorageClass,
    Node,
}

impl ObjectKind {
    /// Short lowercase name used in human output (`pvc/data`, `deployment/web`)
    pub fn short_name(&self) -> &'static str {
        match self {
            ObjectKind::PersistentVolumeClaim => "pvc",
            ObjectKind::Pod => "pod",
            ObjectKind::Deployment => "deployment",
            ObjectKind::Service => "service",
            ObjectKind::ConfigMap => "configmap",
            ObjectKind::StorageClass => "storageclass",
            ObjectKind::Node => "node",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ObjectKind::Pod => "Pod",
            ObjectKind::Deployment => "Deployment",
            ObjectKind::Service => "Service",
            ObjectKind::ConfigMap => "ConfigMap",
            ObjectKind::StorageClass => "StorageClass",
            ObjectKind::Node => "Node",
        };
        write!(f, "{}", name)
    }
}

/// Reference to a single cluster object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectRef {
    pub fn namespaced(kind: ObjectKind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    pub fn cluster_scoped(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: None,
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{} ({})", self.kind.short_name(), self.name, ns),
            None => write!(f, "{}/{}", self.kind.short_name(), self.name),
        }
    }
}

/// Cluster state an action may wait for after it has been submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Convergence {
    /// The object no longer exists (finalizers have run)
    Absent,
    /// A PersistentVolumeClaim reports phase Bound
    PvcBound,
}

impl fmt::Display for Convergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Convergence::Absent => write!(f, "removal"),
            Convergence::PvcBound => write!(f, "binding"),
        }
    }
}

/// Outcome of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// Read and write capabilities against the cluster control plane
///
/// List calls against a namespace that does not exist return an empty list.
/// Transport failures surface as [`crate::error::KfError::ClusterUnreachable`].
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn list_storage_classes(&self) -> Result<Vec<StorageClass>>;

    async fn list_pvcs(&self, namespace: &str) -> Result<Vec<PersistentVolumeClaim>>;

    async fn list_nodes(&self) -> Result<Vec<Node>>;

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>>;

    async fn list_replica_sets(&self, namespace: &str) -> Result<Vec<ReplicaSet>>;

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>>;

    /// Whether node/pod resource metrics can be served
    async fn metrics_available(&self) -> Result<bool>;

    /// Delete an object; a missing object is reported, not raised
    async fn delete(&self, target: &ObjectRef) -> Result<DeleteOutcome>;

    /// Server-side apply every document of a YAML manifest
    async fn apply(&self, manifest: &str) -> Result<Vec<ObjectRef>>;

    async fn scale_deployment(&self, name: &str, namespace: &str, replicas: i32) -> Result<()>;

    /// Resolve once `target` reaches `condition`; callers bound the wait
    async fn await_convergence(&self, target: &ObjectRef, condition: &Convergence) -> Result<()>;
}
