//! Node and metrics rules

use super::types::*;
use crate::cluster::{ObjectKind, ObjectRef};
use crate::inspect::quantity::format_memory;
use crate::inspect::ClusterSnapshot;

pub fn node_memory_pressure(snapshot: &ClusterSnapshot) -> Vec<Finding> {
    snapshot
        .nodes
        .iter()
        .filter(|node| node.memory_pressure)
        .map(|node| {
            let allocatable = node
                .allocatable_memory
                .map(format_memory)
                .unwrap_or_else(|| "unknown".to_string());

            Finding::new(
                RuleId::NodeMemoryPressure,
                Severity::Warning,
                format!(
                    "Node {} is experiencing memory pressure (allocatable {}). Pods may be evicted.",
                    node.name, allocatable
                ),
            )
            .affecting(ObjectRef::cluster_scoped(ObjectKind::Node, &node.name))
            .with_remediation("Free up memory, add more memory, or reduce pod memory requests")
        })
        .collect()
}

pub fn no_metrics_server(snapshot: &ClusterSnapshot) -> Vec<Finding> {
    if snapshot.metrics_available {
        return Vec::new();
    }

    vec![Finding::new(
        RuleId::NoMetricsServer,
        Severity::Info,
        "Node resource metrics are unavailable; usage-based checks were skipped.",
    )
    .with_remediation("Install metrics-server to enable resource usage metrics")]
}
