//! Pod scheduling rules

use super::classify::classify_unschedulable;
use super::types::*;
use crate::cluster::{ObjectKind, ObjectRef};
use crate::inspect::{ClusterSnapshot, PodPhase};

pub fn pending_pods_insufficient_resources(snapshot: &ClusterSnapshot) -> Vec<Finding> {
    let mut findings = Vec::new();

    for pod in &snapshot.pods {
        if pod.phase != PodPhase::Pending {
            continue;
        }
        let Some(reason) = pod.unschedulable_reason.as_deref() else {
            continue;
        };

        let shortage = classify_unschedulable(reason);
        if shortage.is_empty() {
            continue;
        }

        let names: Vec<String> = shortage.iter().map(|r| r.to_string()).collect();
        let mut finding = Finding::new(
            RuleId::PendingPodInsufficientResources,
            Severity::Blocking,
            format!(
                "Pod {} in namespace {} cannot be scheduled: insufficient {}. Scheduler: {}",
                pod.name,
                pod.namespace,
                names.join(", "),
                reason
            ),
        )
        .affecting(ObjectRef::namespaced(ObjectKind::Pod, &pod.name, &pod.namespace))
        .with_remediation("Reduce resource requests or add nodes with more capacity");

        if let Some(owner) = &pod.owner {
            finding = finding.affecting(ObjectRef::namespaced(
                ObjectKind::Deployment,
                owner,
                &pod.namespace,
            ));
        }

        findings.push(finding.with_evidence(Evidence::Pod {
            pod: pod.clone(),
            shortage,
        }));
    }

    findings
}
