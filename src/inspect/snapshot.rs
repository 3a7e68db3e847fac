//! Typed, immutable view of the cluster captured for one diagnostic run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a StorageClass binds claims to volumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BindingMode {
    #[default]
    Immediate,
    WaitForFirstConsumer,
}

impl BindingMode {
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("WaitForFirstConsumer") => BindingMode::WaitForFirstConsumer,
            _ => BindingMode::Immediate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageClassInfo {
    pub name: String,
    pub is_default: bool,
    pub provisioner: String,
    pub binding_mode: BindingMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PvcPhase {
    Pending,
    Bound,
    Lost,
    Unknown,
}

impl PvcPhase {
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("Pending") => PvcPhase::Pending,
            Some("Bound") => PvcPhase::Bound,
            Some("Lost") => PvcPhase::Lost,
            _ => PvcPhase::Unknown,
        }
    }
}

impl fmt::Display for PvcPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A Deployment consuming a claim, with the replica count it had at capture
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub namespace: String,
    pub name: String,
    pub replicas: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvcInfo {
    pub name: String,
    pub namespace: String,
    pub phase: PvcPhase,
    /// Class named in the claim spec, if any
    pub storage_class: Option<String>,
    /// Requested capacity as written in the claim ("10Gi")
    pub requested_storage: Option<String>,
    pub access_modes: Vec<String>,
    pub volume_mode: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Deployments whose pods mount this claim
    #[serde(default)]
    pub consumers: Vec<WorkloadRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    /// Allocatable memory in bytes
    pub allocatable_memory: Option<u64>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub memory_pressure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded,
            Some("Failed") => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Resource requests of one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRequests {
    pub name: String,
    /// Memory request in bytes
    pub memory: Option<u64>,
    /// CPU request in millicores
    pub cpu: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
    /// Scheduler explanation from the PodScheduled=False condition
    pub unschedulable_reason: Option<String>,
    /// Owning Deployment, resolved through the ReplicaSet
    pub owner: Option<String>,
    pub containers: Vec<ContainerRequests>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentInfo {
    pub name: String,
    pub namespace: String,
    pub replicas: i32,
}

/// Cluster state captured once per run
///
/// Every collection is sorted by (namespace, name) so two captures of the
/// same cluster compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub captured_at: DateTime<Utc>,
    pub namespace: String,
    pub storage_classes: Vec<StorageClassInfo>,
    pub pvcs: Vec<PvcInfo>,
    pub nodes: Vec<NodeInfo>,
    pub pods: Vec<PodInfo>,
    pub deployments: Vec<DeploymentInfo>,
    pub metrics_available: bool,
}

impl ClusterSnapshot {
    /// Empty snapshot for a namespace; used as a starting point by callers
    /// that assemble state by hand
    pub fn empty(namespace: impl Into<String>) -> Self {
        Self {
            captured_at: Utc::now(),
            namespace: namespace.into(),
            storage_classes: Vec::new(),
            pvcs: Vec::new(),
            nodes: Vec::new(),
            pods: Vec::new(),
            deployments: Vec::new(),
            metrics_available: true,
        }
    }

    pub fn default_storage_classes(&self) -> impl Iterator<Item = &StorageClassInfo> {
        self.storage_classes.iter().filter(|sc| sc.is_default)
    }

    pub fn storage_class(&self, name: &str) -> Option<&StorageClassInfo> {
        self.storage_classes.iter().find(|sc| sc.name == name)
    }
}
