//! Finding types

use crate::cluster::ObjectRef;
use crate::inspect::{PodInfo, PvcInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Severity level for findings
///
/// Ordered most severe first, so sorting puts blocking findings on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Prevents workloads from scheduling; eligible for remediation
    Blocking,
    /// Worth attention, never acted on automatically
    Warning,
    /// Informational only
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Blocking => write!(f, "BLOCKING"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

/// Identifier of the rule that produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleId {
    NoDefaultStorageClass,
    MultipleDefaultStorageClasses,
    UnboundPvc,
    LostPvc,
    PendingPodInsufficientResources,
    NodeMemoryPressure,
    NoMetricsServer,
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A resource the scheduler could not find enough of
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortResource {
    Cpu,
    Memory,
    /// Any other named resource (ephemeral-storage, nvidia.com/gpu, pods)
    Other(String),
}

impl fmt::Display for ShortResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShortResource::Cpu => write!(f, "cpu"),
            ShortResource::Memory => write!(f, "memory"),
            ShortResource::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Typed data a finding carries for the planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Evidence {
    None,
    Pvc(PvcInfo),
    Pod {
        pod: PodInfo,
        shortage: BTreeSet<ShortResource>,
    },
}

/// A single rule outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub rule: RuleId,
    pub severity: Severity,
    /// Objects the finding is about
    pub affected: Vec<ObjectRef>,
    pub message: String,
    /// Suggested manual remediation
    pub remediation: Option<String>,
    pub evidence: Evidence,
}

impl Finding {
    pub fn new(rule: RuleId, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule,
            severity,
            affected: Vec::new(),
            message: message.into(),
            remediation: None,
            evidence: Evidence::None,
        }
    }

    pub fn affecting(mut self, object: ObjectRef) -> Self {
        self.affected.push(object);
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

/// Counts by severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingSummary {
    pub blocking: usize,
    pub warning: usize,
    pub info: usize,
}

impl FindingSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let count = |sev: Severity| findings.iter().filter(|f| f.severity == sev).count();
        Self {
            blocking: count(Severity::Blocking),
            warning: count(Severity::Warning),
            info: count(Severity::Info),
        }
    }

    /// Overall health status
    pub fn health_status(&self) -> &'static str {
        if self.blocking > 0 {
            "Blocked"
        } else if self.warning > 0 {
            "Warning"
        } else {
            "Healthy"
        }
    }
}
