//! [`ControlPlane`] backed by a live cluster through kube-rs

use super::{ControlPlane, Convergence, DeleteOutcome, ObjectKind, ObjectRef};
use crate::error::{KfError, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{ConfigMap, Node, PersistentVolumeClaim, Pod, Service};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};
use kube::runtime::wait::await_condition;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt::Debug;
use tracing::debug;

/// Control plane reached through a kube [`Client`]
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
    field_manager: String,
}

impl KubeControlPlane {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn apply_params(&self) -> PatchParams {
        PatchParams::apply(&self.field_manager).force()
    }

    async fn apply_document(&self, value: &Value) -> Result<ObjectRef> {
        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .ok_or_else(|| KfError::Manifest("Missing 'kind' field".to_string()))?;

        let api_version = value
            .get("apiVersion")
            .and_then(|v| v.as_str())
            .ok_or_else(|| KfError::Manifest("Missing 'apiVersion' field".to_string()))?;

        let metadata = value
            .get("metadata")
            .ok_or_else(|| KfError::Manifest("Missing 'metadata' field".to_string()))?;

        let name = metadata
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| KfError::Manifest("Missing 'metadata.name' field".to_string()))?;

        let namespace = metadata
            .get("namespace")
            .and_then(|n| n.as_str())
            .unwrap_or("default");

        let pp = self.apply_params();
        let patch = Patch::Apply(value);

        let kind = match (api_version, kind) {
            ("v1", "PersistentVolumeClaim") => {
                let api: Api<PersistentVolumeClaim> = self.namespaced(namespace);
                api.patch(name, &pp, &patch).await?;
                ObjectKind::PersistentVolumeClaim
            }
            ("v1", "ConfigMap") => {
                let api: Api<ConfigMap> = self.namespaced(namespace);
                api.patch(name, &pp, &patch).await?;
                ObjectKind::ConfigMap
            }
            ("v1", "Service") => {
                let api: Api<Service> = self.namespaced(namespace);
                api.patch(name, &pp, &patch).await?;
                ObjectKind::Service
            }
            ("v1", "Pod") => {
                let api: Api<Pod> = self.namespaced(namespace);
                api.patch(name, &pp, &patch).await?;
                ObjectKind::Pod
            }
            ("apps/v1", "Deployment") => {
                let api: Api<Deployment> = self.namespaced(namespace);
                api.patch(name, &pp, &patch).await?;
                ObjectKind::Deployment
            }
            _ => {
                return Err(KfError::Manifest(format!(
                    "Unsupported resource type: {}/{}",
                    api_version, kind
                )));
            }
        };

        debug!(%kind, name, namespace, "applied");
        Ok(ObjectRef::namespaced(kind, name, namespace))
    }
}

async fn list_or_empty<K>(api: Api<K>) -> Result<Vec<K>>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    match api.list(&ListParams::default()).await {
        Ok(list) => Ok(list.items),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

async fn delete_object<K>(api: Api<K>, name: &str) -> Result<DeleteOutcome>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(DeleteOutcome::Deleted),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(DeleteOutcome::AlreadyAbsent),
        Err(e) => Err(e.into()),
    }
}

async fn wait_absent<K>(api: Api<K>, target: &ObjectRef) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
{
    await_condition(api, &target.name, |obj: Option<&K>| obj.is_none())
        .await
        .map(|_| ())
        .map_err(|e| KfError::ActionFailed {
            action: format!("await removal of {}", target),
            reason: e.to_string(),
        })
}

/// Split a multi-document manifest, skipping empty documents
///
/// The YAML parser is not `Send`, so it must be dropped before the first
/// request is awaited.
fn parse_documents(manifest: &str) -> Result<Vec<Value>> {
    let mut documents = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(manifest) {
        let value: Value = serde::Deserialize::deserialize(doc)
            .map_err(|e| KfError::Manifest(format!("Failed to parse YAML: {}", e)))?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

fn is_bound(pvc: Option<&PersistentVolumeClaim>) -> bool {
    pvc.and_then(|p| p.status.as_ref())
        .and_then(|s| s.phase.as_deref())
        == Some("Bound")
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn list_storage_classes(&self) -> Result<Vec<StorageClass>> {
        list_or_empty(Api::<StorageClass>::all(self.client.clone())).await
    }

    async fn list_pvcs(&self, namespace: &str) -> Result<Vec<PersistentVolumeClaim>> {
        list_or_empty(self.namespaced::<PersistentVolumeClaim>(namespace)).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        list_or_empty(Api::<Node>::all(self.client.clone())).await
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        list_or_empty(self.namespaced::<Pod>(namespace)).await
    }

    async fn list_replica_sets(&self, namespace: &str) -> Result<Vec<ReplicaSet>> {
        list_or_empty(self.namespaced::<ReplicaSet>(namespace)).await
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>> {
        list_or_empty(self.namespaced::<Deployment>(namespace)).await
    }

    async fn metrics_available(&self) -> Result<bool> {
        let api: Api<Pod> = self.namespaced("kube-system");
        let pods = api
            .list(&ListParams::default().labels("k8s-app=metrics-server"))
            .await
            .map_err(KfError::from)?;

        Ok(pods.items.iter().any(|p| {
            p.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Running")
        }))
    }

    async fn delete(&self, target: &ObjectRef) -> Result<DeleteOutcome> {
        let ns = target.namespace.as_deref().unwrap_or("default");
        let name = target.name.as_str();

        match target.kind {
            ObjectKind::PersistentVolumeClaim => {
                delete_object(self.namespaced::<PersistentVolumeClaim>(ns), name).await
            }
            ObjectKind::Pod => delete_object(self.namespaced::<Pod>(ns), name).await,
            ObjectKind::Deployment => delete_object(self.namespaced::<Deployment>(ns), name).await,
            ObjectKind::Service => delete_object(self.namespaced::<Service>(ns), name).await,
            ObjectKind::ConfigMap => delete_object(self.namespaced::<ConfigMap>(ns), name).await,
            ObjectKind::StorageClass => {
                delete_object(Api::<StorageClass>::all(self.client.clone()), name).await
            }
            ObjectKind::Node => delete_object(Api::<Node>::all(self.client.clone()), name).await,
        }
    }

    async fn apply(&self, manifest: &str) -> Result<Vec<ObjectRef>> {
        let documents = parse_documents(manifest)?;

        let mut applied = Vec::with_capacity(documents.len());
        for value in &documents {
            applied.push(self.apply_document(value).await?);
        }

        Ok(applied)
    }

    async fn scale_deployment(&self, name: &str, namespace: &str, replicas: i32) -> Result<()> {
        let api: Api<Deployment> = self.namespaced(namespace);
        let patch = json!({
            "spec": {
                "replicas": replicas
            }
        });

        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn await_convergence(&self, target: &ObjectRef, condition: &Convergence) -> Result<()> {
        let ns = target.namespace.as_deref().unwrap_or("default");

        match (condition, target.kind) {
            (Convergence::PvcBound, ObjectKind::PersistentVolumeClaim) => {
                let api: Api<PersistentVolumeClaim> = self.namespaced(ns);
                await_condition(api, &target.name, is_bound)
                    .await
                    .map(|_| ())
                    .map_err(|e| KfError::ActionFailed {
                        action: format!("await binding of {}", target),
                        reason: e.to_string(),
                    })
            }
            (Convergence::PvcBound, kind) => Err(KfError::InvalidArgument(format!(
                "{} has no bound phase",
                kind
            ))),
            (Convergence::Absent, ObjectKind::PersistentVolumeClaim) => {
                wait_absent(self.namespaced::<PersistentVolumeClaim>(ns), target).await
            }
            (Convergence::Absent, ObjectKind::Pod) => {
                wait_absent(self.namespaced::<Pod>(ns), target).await
            }
            (Convergence::Absent, ObjectKind::Deployment) => {
                wait_absent(self.namespaced::<Deployment>(ns), target).await
            }
            (Convergence::Absent, ObjectKind::Service) => {
                wait_absent(self.namespaced::<Service>(ns), target).await
            }
            (Convergence::Absent, ObjectKind::ConfigMap) => {
                wait_absent(self.namespaced::<ConfigMap>(ns), target).await
            }
            (Convergence::Absent, ObjectKind::StorageClass) => {
                wait_absent(Api::<StorageClass>::all(self.client.clone()), target).await
            }
            (Convergence::Absent, ObjectKind::Node) => {
                wait_absent(Api::<Node>::all(self.client.clone()), target).await
            }
        }
    }
}
