// Common test utilities and helpers
#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, ReplicaSet};
use k8s_openapi::api::core::v1::{
    Container, NodeCondition, NodeStatus, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimStatus, PersistentVolumeClaimVolumeSource, Pod, PodCondition, PodSpec,
    PodStatus, PodTemplateSpec, ResourceRequirements, Volume, VolumeResourceRequirements,
};
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use kubefix::cluster::{ControlPlane, Convergence, DeleteOutcome, ObjectKind, ObjectRef};
use kubefix::error::{KfError, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

fn meta(name: &str, namespace: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(String::from),
        ..Default::default()
    }
}

fn requests(memory: Option<&str>, cpu: Option<&str>) -> Option<ResourceRequirements> {
    let mut map = BTreeMap::new();
    if let Some(m) = memory {
        map.insert("memory".to_string(), Quantity(m.to_string()));
    }
    if let Some(c) = cpu {
        map.insert("cpu".to_string(), Quantity(c.to_string()));
    }
    if map.is_empty() {
        return None;
    }
    Some(ResourceRequirements {
        requests: Some(map),
        ..Default::default()
    })
}

/// Create a mock StorageClass that binds immediately
pub fn create_mock_storage_class(name: &str, is_default: bool) -> StorageClass {
    let mut sc = StorageClass {
        metadata: meta(name, None),
        provisioner: "pd.csi.storage.gke.io".to_string(),
        volume_binding_mode: Some("Immediate".to_string()),
        ..Default::default()
    };
    if is_default {
        sc.metadata.annotations = Some(BTreeMap::from([(
            "storageclass.kubernetes.io/is-default-class".to_string(),
            "true".to_string(),
        )]));
    }
    sc
}

/// Create a mock StorageClass that waits for the first consumer
pub fn create_mock_storage_class_wffc(name: &str, is_default: bool) -> StorageClass {
    let mut sc = create_mock_storage_class(name, is_default);
    sc.volume_binding_mode = Some("WaitForFirstConsumer".to_string());
    sc
}

/// Create a mock PVC in the given phase
pub fn create_mock_pvc(
    name: &str,
    namespace: &str,
    phase: &str,
    storage_class: Option<&str>,
    size: &str,
) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: meta(name, Some(namespace)),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: storage_class.map(String::from),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(size.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: Some(PersistentVolumeClaimStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
    }
}

/// Create a mock Node with allocatable memory
pub fn create_mock_node(name: &str, allocatable_memory: &str, memory_pressure: bool) -> Node {
    Node {
        metadata: ObjectMeta {
            labels: Some(BTreeMap::from([(
                "kubernetes.io/hostname".to_string(),
                name.to_string(),
            )])),
            ..meta(name, None)
        },
        status: Some(NodeStatus {
            allocatable: Some(BTreeMap::from([(
                "memory".to_string(),
                Quantity(allocatable_memory.to_string()),
            )])),
            conditions: Some(vec![
                NodeCondition {
                    type_: "Ready".to_string(),
                    status: "True".to_string(),
                    ..Default::default()
                },
                NodeCondition {
                    type_: "MemoryPressure".to_string(),
                    status: if memory_pressure { "True" } else { "False" }.to_string(),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Create a mock Pod with one container
pub fn create_mock_pod(name: &str, namespace: &str, phase: &str) -> Pod {
    Pod {
        metadata: meta(name, Some(namespace)),
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "main".to_string(),
                image: Some("nginx:latest".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
    }
}

/// Create a Pending pod the scheduler rejected with `message`
pub fn create_mock_unschedulable_pod(
    name: &str,
    namespace: &str,
    message: &str,
    memory: Option<&str>,
    cpu: Option<&str>,
) -> Pod {
    let mut pod = create_mock_pod(name, namespace, "Pending");
    if let Some(spec) = pod.spec.as_mut() {
        spec.containers[0].resources = requests(memory, cpu);
    }
    if let Some(status) = pod.status.as_mut() {
        status.conditions = Some(vec![PodCondition {
            type_: "PodScheduled".to_string(),
            status: "False".to_string(),
            reason: Some("Unschedulable".to_string()),
            message: Some(message.to_string()),
            ..Default::default()
        }]);
    }
    pod
}

/// Mark a pod as created by a ReplicaSet
pub fn owned_by_replica_set(mut pod: Pod, replica_set: &str) -> Pod {
    pod.metadata.owner_references = Some(vec![OwnerReference {
        api_version: "apps/v1".to_string(),
        kind: "ReplicaSet".to_string(),
        name: replica_set.to_string(),
        uid: format!("uid-{}", replica_set),
        controller: Some(true),
        ..Default::default()
    }]);
    pod
}

/// Mount a claim into a pod
pub fn mounting_claim(mut pod: Pod, claim: &str) -> Pod {
    if let Some(spec) = pod.spec.as_mut() {
        spec.volumes.get_or_insert_with(Vec::new).push(Volume {
            name: "data".to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim.to_string(),
                read_only: None,
            }),
            ..Default::default()
        });
    }
    pod
}

/// Create a mock ReplicaSet owned by a Deployment
pub fn create_mock_replica_set(name: &str, namespace: &str, deployment: &str) -> ReplicaSet {
    ReplicaSet {
        metadata: ObjectMeta {
            owner_references: Some(vec![OwnerReference {
                api_version: "apps/v1".to_string(),
                kind: "Deployment".to_string(),
                name: deployment.to_string(),
                uid: format!("uid-{}", deployment),
                controller: Some(true),
                ..Default::default()
            }]),
            ..meta(name, Some(namespace))
        },
        ..Default::default()
    }
}

/// Create a mock Deployment whose single container requests `memory`/`cpu`
pub fn create_mock_deployment(
    name: &str,
    namespace: &str,
    replicas: i32,
    memory: Option<&str>,
    cpu: Option<&str>,
) -> Deployment {
    Deployment {
        metadata: meta(name, Some(namespace)),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(BTreeMap::from([("app".to_string(), name.to_string())])),
                ..Default::default()
            },
            template: PodTemplateSpec {
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "main".to_string(),
                        image: Some("nginx:latest".to_string()),
                        resources: requests(memory, cpu),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }),
        status: None,
    }
}

/// Running metrics-server pod, as the live probe looks for
pub fn create_mock_metrics_server_pod() -> Pod {
    let mut pod = create_mock_pod("metrics-server-5f8d", "kube-system", "Running");
    pod.metadata.labels = Some(BTreeMap::from([(
        "k8s-app".to_string(),
        "metrics-server".to_string(),
    )]));
    pod
}

/// Cluster objects held by [`FakeControlPlane`]
#[derive(Default)]
pub struct FakeCluster {
    pub storage_classes: Vec<StorageClass>,
    pub pvcs: Vec<PersistentVolumeClaim>,
    pub nodes: Vec<Node>,
    pub pods: Vec<Pod>,
    pub replica_sets: Vec<ReplicaSet>,
    pub deployments: Vec<Deployment>,
    pub metrics_available: bool,
}

/// In-memory control plane
///
/// Writes take effect immediately. Individual writes can be made to fail,
/// and individual objects can be made to never converge.
#[derive(Default)]
pub struct FakeControlPlane {
    cluster: Mutex<FakeCluster>,
    unreachable: bool,
    /// Reads answer, every write fails as if the connection dropped
    unreachable_on_write: bool,
    /// Action labels ("delete pvc/x", "apply deployment/x", "scale deployment/x") that fail
    rejected: HashSet<String>,
    /// Objects whose convergence wait never resolves
    stuck: HashSet<ObjectRef>,
    calls: Mutex<Vec<String>>,
}

impl FakeControlPlane {
    pub fn new(cluster: FakeCluster) -> Self {
        Self {
            cluster: Mutex::new(cluster),
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn disconnecting_on_write(mut self) -> Self {
        self.unreachable_on_write = true;
        self
    }

    pub fn rejecting(mut self, label: &str) -> Self {
        self.rejected.insert(label.to_string());
        self
    }

    pub fn never_converging(mut self, target: ObjectRef) -> Self {
        self.stuck.insert(target);
        self
    }

    /// Every write request received, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pvc(&self, name: &str, namespace: &str) -> Option<PersistentVolumeClaim> {
        self.cluster
            .lock()
            .unwrap()
            .pvcs
            .iter()
            .find(|p| is(&p.metadata, name, Some(namespace)))
            .cloned()
    }

    pub fn deployment(&self, name: &str, namespace: &str) -> Option<Deployment> {
        self.cluster
            .lock()
            .unwrap()
            .deployments
            .iter()
            .find(|d| is(&d.metadata, name, Some(namespace)))
            .cloned()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable {
            return Err(KfError::ClusterUnreachable(
                "connection refused (127.0.0.1:6443)".to_string(),
            ));
        }
        Ok(())
    }

    fn record(&self, label: String) -> Result<()> {
        self.check_reachable()?;
        if self.unreachable_on_write {
            return Err(KfError::ClusterUnreachable(format!(
                "connection reset while sending {}",
                label
            )));
        }
        self.calls.lock().unwrap().push(label.clone());
        if self.rejected.contains(&label) {
            return Err(KfError::InvalidArgument(format!(
                "admission webhook denied {}",
                label
            )));
        }
        Ok(())
    }

    fn apply_value(&self, value: Value) -> Result<ObjectRef> {
        let kind = value["kind"].as_str().unwrap_or_default().to_string();
        let name = value["metadata"]["name"].as_str().unwrap_or_default().to_string();
        let namespace = value["metadata"]["namespace"]
            .as_str()
            .unwrap_or("default")
            .to_string();

        let mut cluster = self.cluster.lock().unwrap();
        match kind.as_str() {
            "PersistentVolumeClaim" => {
                let pvc: PersistentVolumeClaim = serde_json::from_value(value)?;
                cluster.pvcs.retain(|p| !is(&p.metadata, &name, Some(&namespace)));
                cluster.pvcs.push(pvc);
                Ok(ObjectRef::namespaced(ObjectKind::PersistentVolumeClaim, name, namespace))
            }
            "Deployment" => {
                let deploy = cluster
                    .deployments
                    .iter_mut()
                    .find(|d| is(&d.metadata, &name, Some(&namespace)))
                    .ok_or_else(|| KfError::Manifest(format!("deployment {} not found", name)))?;
                merge_requests(deploy, &value);
                Ok(ObjectRef::namespaced(ObjectKind::Deployment, name, namespace))
            }
            other => Err(KfError::Manifest(format!("Unsupported resource type: {}", other))),
        }
    }
}

fn is(meta: &ObjectMeta, name: &str, namespace: Option<&str>) -> bool {
    meta.name.as_deref() == Some(name) && meta.namespace.as_deref() == namespace
}

fn in_namespace(meta: &ObjectMeta, namespace: &str) -> bool {
    meta.namespace.as_deref() == Some(namespace)
}

/// Server-side apply of a partial Deployment, reduced to container requests
fn merge_requests(deploy: &mut Deployment, manifest: &Value) {
    let Some(containers) = manifest["spec"]["template"]["spec"]["containers"].as_array() else {
        return;
    };
    let Some(spec) = deploy.spec.as_mut().and_then(|s| s.template.spec.as_mut()) else {
        return;
    };

    for applied in containers {
        let Some(target) = spec
            .containers
            .iter_mut()
            .find(|c| Some(c.name.as_str()) == applied["name"].as_str())
        else {
            continue;
        };
        let Some(requests) = applied["resources"]["requests"].as_object() else {
            continue;
        };
        let current = target
            .resources
            .get_or_insert_with(Default::default)
            .requests
            .get_or_insert_with(BTreeMap::new);
        for (resource, quantity) in requests {
            if let Some(q) = quantity.as_str() {
                current.insert(resource.clone(), Quantity(q.to_string()));
            }
        }
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn list_storage_classes(&self) -> Result<Vec<StorageClass>> {
        self.check_reachable()?;
        Ok(self.cluster.lock().unwrap().storage_classes.clone())
    }

    async fn list_pvcs(&self, namespace: &str) -> Result<Vec<PersistentVolumeClaim>> {
        self.check_reachable()?;
        let cluster = self.cluster.lock().unwrap();
        Ok(cluster
            .pvcs
            .iter()
            .filter(|p| in_namespace(&p.metadata, namespace))
            .cloned()
            .collect())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.check_reachable()?;
        Ok(self.cluster.lock().unwrap().nodes.clone())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        self.check_reachable()?;
        let cluster = self.cluster.lock().unwrap();
        Ok(cluster
            .pods
            .iter()
            .filter(|p| in_namespace(&p.metadata, namespace))
            .cloned()
            .collect())
    }

    async fn list_replica_sets(&self, namespace: &str) -> Result<Vec<ReplicaSet>> {
        self.check_reachable()?;
        let cluster = self.cluster.lock().unwrap();
        Ok(cluster
            .replica_sets
            .iter()
            .filter(|r| in_namespace(&r.metadata, namespace))
            .cloned()
            .collect())
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>> {
        self.check_reachable()?;
        let cluster = self.cluster.lock().unwrap();
        Ok(cluster
            .deployments
            .iter()
            .filter(|d| in_namespace(&d.metadata, namespace))
            .cloned()
            .collect())
    }

    async fn metrics_available(&self) -> Result<bool> {
        self.check_reachable()?;
        Ok(self.cluster.lock().unwrap().metrics_available)
    }

    async fn delete(&self, target: &ObjectRef) -> Result<DeleteOutcome> {
        self.record(format!("delete {}/{}", target.kind.short_name(), target.name))?;

        let ns = target.namespace.as_deref();
        let mut cluster = self.cluster.lock().unwrap();
        let before = cluster.pvcs.len() + cluster.deployments.len() + cluster.pods.len();
        match target.kind {
            ObjectKind::PersistentVolumeClaim => {
                cluster.pvcs.retain(|p| !is(&p.metadata, &target.name, ns))
            }
            ObjectKind::Deployment => {
                cluster.deployments.retain(|d| !is(&d.metadata, &target.name, ns))
            }
            ObjectKind::Pod => cluster.pods.retain(|p| !is(&p.metadata, &target.name, ns)),
            _ => {}
        }
        let after = cluster.pvcs.len() + cluster.deployments.len() + cluster.pods.len();

        Ok(if after < before {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::AlreadyAbsent
        })
    }

    async fn apply(&self, manifest: &str) -> Result<Vec<ObjectRef>> {
        let documents = serde_yaml::Deserializer::from_str(manifest)
            .map(|doc| serde::Deserialize::deserialize(doc))
            .collect::<std::result::Result<Vec<Value>, _>>()?;

        let mut applied = Vec::new();
        for value in documents.into_iter().filter(|v| !v.is_null()) {
            let kind = match value["kind"].as_str() {
                Some("PersistentVolumeClaim") => "pvc",
                Some("Deployment") => "deployment",
                _ => "unknown",
            };
            let label = format!(
                "apply {}/{}",
                kind,
                value["metadata"]["name"].as_str().unwrap_or_default()
            );
            self.record(label)?;
            applied.push(self.apply_value(value)?);
        }
        Ok(applied)
    }

    async fn scale_deployment(&self, name: &str, namespace: &str, replicas: i32) -> Result<()> {
        self.record(format!("scale deployment/{} {}", name, replicas))?;

        let mut cluster = self.cluster.lock().unwrap();
        let deploy = cluster
            .deployments
            .iter_mut()
            .find(|d| is(&d.metadata, name, Some(namespace)))
            .ok_or_else(|| KfError::InvalidArgument(format!("deployment {} not found", name)))?;
        if let Some(spec) = deploy.spec.as_mut() {
            spec.replicas = Some(replicas);
        }
        Ok(())
    }

    async fn await_convergence(&self, target: &ObjectRef, condition: &Convergence) -> Result<()> {
        self.check_reachable()?;
        if self.stuck.contains(target) {
            return std::future::pending().await;
        }

        if *condition == Convergence::PvcBound {
            let mut cluster = self.cluster.lock().unwrap();
            let ns = target.namespace.as_deref();
            if let Some(pvc) = cluster.pvcs.iter_mut().find(|p| is(&p.metadata, &target.name, ns)) {
                pvc.status = Some(PersistentVolumeClaimStatus {
                    phase: Some("Bound".to_string()),
                    ..Default::default()
                });
            }
        }
        Ok(())
    }
}
