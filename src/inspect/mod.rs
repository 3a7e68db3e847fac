//! Cluster inspection
//!
//! Reads storage classes, claims, nodes, pods and their owning workloads
//! through a [`ControlPlane`] and folds them into a [`ClusterSnapshot`].
//! Inspection never writes to the cluster.

pub mod quantity;
pub mod snapshot;

pub use snapshot::*;

use crate::cluster::ControlPlane;
use crate::error::Result;
use chrono::Utc;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{Node, PersistentVolumeClaim, Pod};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use quantity::{parse_cpu, parse_memory};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

const DEFAULT_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";
const BETA_DEFAULT_CLASS_ANNOTATION: &str = "storageclass.beta.kubernetes.io/is-default-class";

/// Captures [`ClusterSnapshot`]s from a control plane
pub struct ClusterInspector<'a> {
    cluster: &'a dyn ControlPlane,
}

impl<'a> ClusterInspector<'a> {
    pub fn new(cluster: &'a dyn ControlPlane) -> Self {
        Self { cluster }
    }

    /// Capture the state relevant to scheduling failures in `namespace`
    ///
    /// A namespace that does not exist yields empty PVC and pod sets.
    pub async fn snapshot(&self, namespace: &str) -> Result<ClusterSnapshot> {
        debug!(namespace, "capturing cluster snapshot");

        let storage_classes = self.cluster.list_storage_classes().await?;
        let nodes = self.cluster.list_nodes().await?;
        let pvcs = self.cluster.list_pvcs(namespace).await?;
        let pods = self.cluster.list_pods(namespace).await?;
        let replica_sets = self.cluster.list_replica_sets(namespace).await?;
        let deployments = self.cluster.list_deployments(namespace).await?;

        let metrics_available = match self.cluster.metrics_available().await {
            Ok(available) => available,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("metrics probe failed, treating metrics as unavailable: {}", e);
                false
            }
        };

        let snapshot = build_snapshot(
            namespace,
            &storage_classes,
            &nodes,
            &pvcs,
            &pods,
            &replica_sets,
            &deployments,
            metrics_available,
        );

        info!(
            namespace,
            storage_classes = snapshot.storage_classes.len(),
            pvcs = snapshot.pvcs.len(),
            pods = snapshot.pods.len(),
            nodes = snapshot.nodes.len(),
            "snapshot captured"
        );

        Ok(snapshot)
    }
}

/// Fold raw API objects into a snapshot
#[allow(clippy::too_many_arguments)]
pub fn build_snapshot(
    namespace: &str,
    storage_classes: &[StorageClass],
    nodes: &[Node],
    pvcs: &[PersistentVolumeClaim],
    pods: &[Pod],
    replica_sets: &[ReplicaSet],
    deployments: &[Deployment],
    metrics_available: bool,
) -> ClusterSnapshot {
    let deployments: Vec<DeploymentInfo> = deployments.iter().map(deployment_info).collect();
    let rs_owners = replica_set_owners(replica_sets);

    let consumers = claim_consumers(pods, &rs_owners, &deployments);

    let mut storage_classes: Vec<StorageClassInfo> =
        storage_classes.iter().map(storage_class_info).collect();
    storage_classes.sort_by(|a, b| a.name.cmp(&b.name));

    let mut nodes: Vec<NodeInfo> = nodes.iter().map(node_info).collect();
    nodes.sort_by(|a, b| a.name.cmp(&b.name));

    let mut pvcs: Vec<PvcInfo> = pvcs
        .iter()
        .map(|pvc| {
            let mut info = pvc_info(pvc);
            if let Some(users) = consumers.get(&(info.namespace.clone(), info.name.clone())) {
                info.consumers = users.iter().cloned().collect();
            }
            info
        })
        .collect();
    pvcs.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));

    let mut pods: Vec<PodInfo> = pods.iter().map(|p| pod_info(p, &rs_owners)).collect();
    pods.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));

    let mut deployments = deployments;
    deployments.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));

    ClusterSnapshot {
        captured_at: Utc::now(),
        namespace: namespace.to_string(),
        storage_classes,
        pvcs,
        nodes,
        pods,
        deployments,
        metrics_available,
    }
}

fn name_of(meta: &ObjectMeta) -> String {
    meta.name.clone().unwrap_or_else(|| "unknown".to_string())
}

fn namespace_of(meta: &ObjectMeta) -> String {
    meta.namespace.clone().unwrap_or_else(|| "default".to_string())
}

fn labels_of(meta: &ObjectMeta) -> BTreeMap<String, String> {
    meta.labels.clone().unwrap_or_default()
}

pub fn storage_class_info(sc: &StorageClass) -> StorageClassInfo {
    let is_default = sc
        .metadata
        .annotations
        .as_ref()
        .map(|a| {
            [DEFAULT_CLASS_ANNOTATION, BETA_DEFAULT_CLASS_ANNOTATION]
                .iter()
                .any(|key| a.get(*key).map(String::as_str) == Some("true"))
        })
        .unwrap_or(false);

    StorageClassInfo {
        name: name_of(&sc.metadata),
        is_default,
        provisioner: sc.provisioner.clone(),
        binding_mode: BindingMode::parse(sc.volume_binding_mode.as_deref()),
    }
}

pub fn pvc_info(pvc: &PersistentVolumeClaim) -> PvcInfo {
    let spec = pvc.spec.as_ref();

    let requested_storage = spec
        .and_then(|s| s.resources.as_ref())
        .and_then(|r| r.requests.as_ref())
        .and_then(|r| r.get("storage"))
        .map(|q| q.0.clone());

    PvcInfo {
        name: name_of(&pvc.metadata),
        namespace: namespace_of(&pvc.metadata),
        phase: PvcPhase::parse(pvc.status.as_ref().and_then(|s| s.phase.as_deref())),
        storage_class: spec.and_then(|s| s.storage_class_name.clone()),
        requested_storage,
        access_modes: spec.and_then(|s| s.access_modes.clone()).unwrap_or_default(),
        volume_mode: spec.and_then(|s| s.volume_mode.clone()),
        labels: labels_of(&pvc.metadata),
        consumers: Vec::new(),
    }
}

pub fn node_info(node: &Node) -> NodeInfo {
    let status = node.status.as_ref();

    let allocatable_memory = status
        .and_then(|s| s.allocatable.as_ref())
        .and_then(|a| a.get("memory"))
        .and_then(|q| parse_memory(&q.0));

    let memory_pressure = status
        .and_then(|s| s.conditions.as_ref())
        .map(|conds| {
            conds
                .iter()
                .any(|c| c.type_ == "MemoryPressure" && c.status == "True")
        })
        .unwrap_or(false);

    NodeInfo {
        name: name_of(&node.metadata),
        allocatable_memory,
        labels: labels_of(&node.metadata),
        memory_pressure,
    }
}

/// Explanation the scheduler left on a pod it could not place
pub fn unschedulable_reason(pod: &Pod) -> Option<String> {
    let conditions = pod.status.as_ref()?.conditions.as_ref()?;
    let scheduled = conditions
        .iter()
        .find(|c| c.type_ == "PodScheduled" && c.status == "False")?;

    scheduled
        .message
        .clone()
        .filter(|m| !m.is_empty())
        .or_else(|| scheduled.reason.clone())
}

pub fn pod_info(pod: &Pod, rs_owners: &HashMap<String, String>) -> PodInfo {
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .map(|c| {
                    let requests = c.resources.as_ref().and_then(|r| r.requests.as_ref());
                    ContainerRequests {
                        name: c.name.clone(),
                        memory: requests
                            .and_then(|r| r.get("memory"))
                            .and_then(|q| parse_memory(&q.0)),
                        cpu: requests
                            .and_then(|r| r.get("cpu"))
                            .and_then(|q| parse_cpu(&q.0)),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    PodInfo {
        name: name_of(&pod.metadata),
        namespace: namespace_of(&pod.metadata),
        phase: PodPhase::parse(pod.status.as_ref().and_then(|s| s.phase.as_deref())),
        unschedulable_reason: unschedulable_reason(pod),
        owner: owning_deployment(&pod.metadata, rs_owners),
        containers,
    }
}

fn deployment_info(deploy: &Deployment) -> DeploymentInfo {
    DeploymentInfo {
        name: name_of(&deploy.metadata),
        namespace: namespace_of(&deploy.metadata),
        replicas: deploy.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1),
    }
}

/// Map of ReplicaSet name to the Deployment that owns it
fn replica_set_owners(replica_sets: &[ReplicaSet]) -> HashMap<String, String> {
    replica_sets
        .iter()
        .filter_map(|rs| {
            let owner = rs
                .metadata
                .owner_references
                .as_ref()?
                .iter()
                .find(|o| o.kind == "Deployment")?;
            Some((rs.metadata.name.clone()?, owner.name.clone()))
        })
        .collect()
}

fn owning_deployment(meta: &ObjectMeta, rs_owners: &HashMap<String, String>) -> Option<String> {
    let owner = meta
        .owner_references
        .as_ref()?
        .iter()
        .find(|o| o.kind == "ReplicaSet")?;
    rs_owners.get(&owner.name).cloned()
}

/// Deployments mounting each (namespace, claim)
fn claim_consumers(
    pods: &[Pod],
    rs_owners: &HashMap<String, String>,
    deployments: &[DeploymentInfo],
) -> HashMap<(String, String), BTreeSet<WorkloadRef>> {
    let mut consumers: HashMap<(String, String), BTreeSet<WorkloadRef>> = HashMap::new();

    for pod in pods {
        let Some(owner) = owning_deployment(&pod.metadata, rs_owners) else {
            continue;
        };
        let ns = namespace_of(&pod.metadata);
        let Some(deploy) = deployments
            .iter()
            .find(|d| d.namespace == ns && d.name == owner)
        else {
            continue;
        };

        let claims = pod
            .spec
            .as_ref()
            .and_then(|s| s.volumes.as_ref())
            .into_iter()
            .flatten()
            .filter_map(|v| v.persistent_volume_claim.as_ref())
            .map(|c| c.claim_name.clone());

        for claim in claims {
            consumers
                .entry((ns.clone(), claim))
                .or_default()
                .insert(WorkloadRef {
                    namespace: ns.clone(),
                    name: deploy.name.clone(),
                    replicas: deploy.replicas,
                });
        }
    }

    consumers
}
