//! Diagnostic rules
//!
//! Each rule is a pure function of a [`ClusterSnapshot`]. The engine runs
//! them in the declared order; order only affects how findings are listed.

pub mod classify;
pub mod nodes;
pub mod storage;
pub mod types;
pub mod workloads;

pub use classify::classify_unschedulable;
pub use types::*;

use crate::inspect::ClusterSnapshot;
use tracing::debug;

/// A rule: snapshot in, findings out
pub type Rule = fn(&ClusterSnapshot) -> Vec<Finding>;

/// Every rule, in evaluation order
pub const RULES: &[(RuleId, Rule)] = &[
    (RuleId::NoDefaultStorageClass, storage::no_default_storage_class as Rule),
    (RuleId::MultipleDefaultStorageClasses, storage::multiple_default_storage_classes as Rule),
    (RuleId::UnboundPvc, storage::unbound_pvcs as Rule),
    (RuleId::LostPvc, storage::lost_pvcs as Rule),
    (RuleId::PendingPodInsufficientResources, workloads::pending_pods_insufficient_resources as Rule),
    (RuleId::NodeMemoryPressure, nodes::node_memory_pressure as Rule),
    (RuleId::NoMetricsServer, nodes::no_metrics_server as Rule),
];

/// Evaluates [`RULES`] against snapshots
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, snapshot: &ClusterSnapshot) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (id, rule) in RULES {
            let triggered = rule(snapshot);
            debug!(rule = %id, findings = triggered.len(), "rule evaluated");
            findings.extend(triggered);
        }

        findings
    }
}
