//! Manifests regenerated by the planner

use crate::error::{KfError, Result};
use crate::inspect::quantity::{format_cpu, format_memory};
use crate::inspect::{ContainerRequests, PvcInfo};
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A claim equivalent to `pvc` that names `storage_class`
pub fn pvc_manifest(pvc: &PvcInfo, storage_class: &str) -> Result<String> {
    let storage = pvc.requested_storage.as_ref().ok_or_else(|| {
        KfError::Manifest(format!(
            "PVC {}/{} has no storage request to carry over",
            pvc.namespace, pvc.name
        ))
    })?;

    let access_modes = if pvc.access_modes.is_empty() {
        vec!["ReadWriteOnce".to_string()]
    } else {
        pvc.access_modes.clone()
    };

    let claim = PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(pvc.name.clone()),
            namespace: Some(pvc.namespace.clone()),
            labels: if pvc.labels.is_empty() {
                None
            } else {
                Some(pvc.labels.clone())
            },
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(access_modes),
            storage_class_name: Some(storage_class.to_string()),
            volume_mode: pvc.volume_mode.clone(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(storage.clone()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: None,
    };

    Ok(serde_yaml::to_string(&claim)?)
}

/// A partial Deployment carrying only container requests
///
/// Applied server-side, the field manager takes ownership of just these
/// request fields; selector, template labels and replicas stay untouched.
pub fn deployment_requests_manifest(
    name: &str,
    namespace: &str,
    containers: &[ContainerRequests],
) -> Result<String> {
    let containers: Vec<Value> = containers
        .iter()
        .map(|c| {
            let mut requests = Map::new();
            if let Some(memory) = c.memory {
                requests.insert("memory".to_string(), Value::String(format_memory(memory)));
            }
            if let Some(cpu) = c.cpu {
                requests.insert("cpu".to_string(), Value::String(format_cpu(cpu)));
            }
            json!({
                "name": c.name,
                "resources": { "requests": requests }
            })
        })
        .collect();

    if containers.is_empty() {
        return Err(KfError::Manifest(format!(
            "Deployment {}/{} has no container requests to apply",
            namespace, name
        )));
    }

    let manifest = json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": name,
            "namespace": namespace
        },
        "spec": {
            "template": {
                "spec": {
                    "containers": containers
                }
            }
        }
    });

    Ok(serde_yaml::to_string(&manifest)?)
}
