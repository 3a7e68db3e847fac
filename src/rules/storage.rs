//! Storage rules
//!
//! - default StorageClass presence
//! - PVC binding status

use super::types::*;
use crate::cluster::{ObjectKind, ObjectRef};
use crate::inspect::{ClusterSnapshot, PvcPhase};

pub fn no_default_storage_class(snapshot: &ClusterSnapshot) -> Vec<Finding> {
    if snapshot.default_storage_classes().next().is_some() {
        return Vec::new();
    }

    let message = if snapshot.storage_classes.is_empty() {
        "No StorageClasses are installed. Dynamic provisioning will not work.".to_string()
    } else {
        format!(
            "None of the {} StorageClasses is marked default. PVCs must name a storageClassName.",
            snapshot.storage_classes.len()
        )
    };

    vec![Finding::new(RuleId::NoDefaultStorageClass, Severity::Warning, message)
        .with_remediation("Set a default StorageClass with the is-default-class annotation")]
}

pub fn multiple_default_storage_classes(snapshot: &ClusterSnapshot) -> Vec<Finding> {
    let defaults: Vec<_> = snapshot.default_storage_classes().collect();
    if defaults.len() < 2 {
        return Vec::new();
    }

    let names: Vec<&str> = defaults.iter().map(|sc| sc.name.as_str()).collect();
    let mut finding = Finding::new(
        RuleId::MultipleDefaultStorageClasses,
        Severity::Warning,
        format!(
            "{} StorageClasses are marked default ({}). Claims without a class get an unpredictable one.",
            defaults.len(),
            names.join(", ")
        ),
    )
    .with_remediation("Ensure only one StorageClass is marked as default");

    for sc in defaults {
        finding = finding.affecting(ObjectRef::cluster_scoped(ObjectKind::StorageClass, &sc.name));
    }

    vec![finding]
}

pub fn unbound_pvcs(snapshot: &ClusterSnapshot) -> Vec<Finding> {
    snapshot
        .pvcs
        .iter()
        .filter(|pvc| pvc.phase == PvcPhase::Pending)
        .map(|pvc| {
            let class = match &pvc.storage_class {
                Some(name) if snapshot.storage_class(name).is_none() => {
                    format!("StorageClass {} which does not exist", name)
                }
                Some(name) => format!("StorageClass {}", name),
                None => "no StorageClass".to_string(),
            };

            Finding::new(
                RuleId::UnboundPvc,
                Severity::Blocking,
                format!(
                    "PVC {} in namespace {} is Pending and references {}.",
                    pvc.name, pvc.namespace, class
                ),
            )
            .affecting(ObjectRef::namespaced(
                ObjectKind::PersistentVolumeClaim,
                &pvc.name,
                &pvc.namespace,
            ))
            .with_remediation("Recreate the claim against an installed StorageClass")
            .with_evidence(Evidence::Pvc(pvc.clone()))
        })
        .collect()
}

pub fn lost_pvcs(snapshot: &ClusterSnapshot) -> Vec<Finding> {
    snapshot
        .pvcs
        .iter()
        .filter(|pvc| pvc.phase == PvcPhase::Lost)
        .map(|pvc| {
            Finding::new(
                RuleId::LostPvc,
                Severity::Warning,
                format!(
                    "PVC {} in namespace {} has lost its bound PersistentVolume. Data may be inaccessible.",
                    pvc.name, pvc.namespace
                ),
            )
            .affecting(ObjectRef::namespaced(
                ObjectKind::PersistentVolumeClaim,
                &pvc.name,
                &pvc.namespace,
            ))
            .with_remediation("Investigate the missing PV and consider data recovery")
        })
        .collect()
}
