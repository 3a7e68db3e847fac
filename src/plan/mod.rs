//! Remediation planning
//!
//! Turns blocking findings into an ordered list of actions. A finding that
//! cannot be planned is recorded as a [`PlanningError`] and contributes no
//! actions; the others are planned regardless.

pub mod action;
pub mod manifest;

pub use action::*;

use crate::cluster::{Convergence, ObjectKind, ObjectRef};
use crate::config::AppConfig;
use crate::error::{KfError, Result};
use crate::inspect::quantity::{format_cpu, format_memory};
use crate::inspect::{BindingMode, ClusterSnapshot, ContainerRequests, PodInfo, PvcInfo, StorageClassInfo, WorkloadRef};
use crate::rules::{Evidence, Finding, RuleId, ShortResource};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use tracing::{debug, warn};

/// Knobs the planner works within
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerPolicy {
    /// Classes to prefer, in order, when they are installed
    pub preferred_storage_classes: Vec<String>,
    pub min_memory_bytes: u64,
    pub min_cpu_millis: u64,
    /// Wait budget attached to actions that need the cluster to converge
    pub convergence_timeout: Duration,
}

impl PlannerPolicy {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            preferred_storage_classes: config.preferred_storage_classes.clone(),
            min_memory_bytes: config.min_memory_bytes()?,
            min_cpu_millis: config.min_cpu_millis()?,
            convergence_timeout: config.convergence_timeout(),
        })
    }
}

impl Default for PlannerPolicy {
    fn default() -> Self {
        Self {
            preferred_storage_classes: Vec::new(),
            min_memory_bytes: 256 * 1024 * 1024,
            min_cpu_millis: 100,
            convergence_timeout: Duration::from_secs(120),
        }
    }
}

/// A finding the planner could not turn into actions
#[derive(Debug, Serialize)]
pub struct PlanningError {
    pub rule: RuleId,
    pub affected: Vec<ObjectRef>,
    #[serde(serialize_with = "crate::error::serialize_display")]
    pub error: KfError,
}

/// Ordered actions plus the findings that could not be planned
#[derive(Debug, Default, Serialize)]
pub struct Plan {
    pub actions: Vec<RemediationAction>,
    pub errors: Vec<PlanningError>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.errors.is_empty()
    }
}

/// Actions derived from one finding, grouped by the stage they run in
#[derive(Default)]
struct Fragment {
    scale_down: Vec<WorkloadRef>,
    deletes: Vec<RemediationAction>,
    applies: Vec<RemediationAction>,
    adjustments: Vec<Adjustment>,
    scale_up: Vec<WorkloadRef>,
}

/// Reduced requests for one Deployment, before rendering
#[derive(Clone)]
struct Adjustment {
    namespace: String,
    deployment: String,
    containers: Vec<ContainerRequests>,
    /// Pods whose findings asked for the reduction
    affected: Vec<ObjectRef>,
}

impl Adjustment {
    fn targets_same(&self, other: &Adjustment) -> bool {
        self.namespace == other.namespace && self.deployment == other.deployment
    }

    /// Fold another reduction of the same Deployment in, keeping the lower
    /// request per container and resource
    fn absorb(&mut self, other: &Adjustment) {
        for incoming in &other.containers {
            match self.containers.iter_mut().find(|c| c.name == incoming.name) {
                Some(existing) => {
                    existing.memory = lower(existing.memory, incoming.memory);
                    existing.cpu = lower(existing.cpu, incoming.cpu);
                }
                None => self.containers.push(incoming.clone()),
            }
        }
        self.affected.extend(other.affected.iter().cloned());
    }
}

fn lower(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Plans remediations for findings against the storage classes of one snapshot
#[derive(Debug, Clone)]
pub struct RemediationPlanner {
    policy: PlannerPolicy,
    storage_classes: Vec<StorageClassInfo>,
}

impl RemediationPlanner {
    pub fn new(policy: PlannerPolicy, storage_classes: &[StorageClassInfo]) -> Self {
        let mut storage_classes = storage_classes.to_vec();
        storage_classes.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            policy,
            storage_classes,
        }
    }

    pub fn for_snapshot(policy: PlannerPolicy, snapshot: &ClusterSnapshot) -> Self {
        Self::new(policy, &snapshot.storage_classes)
    }

    /// Class a regenerated claim should use
    ///
    /// The first preferred class that is installed wins, then the cluster
    /// default. A name is never invented.
    pub fn select_storage_class(&self) -> Option<&StorageClassInfo> {
        self.policy
            .preferred_storage_classes
            .iter()
            .find_map(|wanted| self.storage_classes.iter().find(|sc| &sc.name == wanted))
            .or_else(|| self.storage_classes.iter().find(|sc| sc.is_default))
    }

    /// Plan every blocking finding
    ///
    /// The output depends only on the findings and the planner's inputs.
    pub fn plan(&self, findings: &[Finding]) -> Plan {
        let mut fragments = Vec::new();
        let mut errors = Vec::new();

        for finding in findings.iter().filter(|f| f.is_blocking()) {
            match self.plan_finding(finding) {
                Ok(Some(fragment)) => fragments.push(fragment),
                Ok(None) => debug!(rule = %finding.rule, "no remediation for finding"),
                Err(error) => {
                    warn!(rule = %finding.rule, "cannot plan remediation: {}", error);
                    errors.push(PlanningError {
                        rule: finding.rule,
                        affected: finding.affected.clone(),
                        error,
                    });
                }
            }
        }

        let actions = merge(fragments, &mut errors);
        Plan { actions, errors }
    }

    fn plan_finding(&self, finding: &Finding) -> Result<Option<Fragment>> {
        match (&finding.rule, &finding.evidence) {
            (RuleId::UnboundPvc, Evidence::Pvc(pvc)) => self.plan_pvc(pvc).map(Some),
            (RuleId::PendingPodInsufficientResources, Evidence::Pod { pod, shortage }) => {
                self.plan_pod(pod, shortage).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn plan_pvc(&self, pvc: &PvcInfo) -> Result<Fragment> {
        let class = self
            .select_storage_class()
            .ok_or_else(|| KfError::NoViableStorageClass {
                pvc: pvc.name.clone(),
                namespace: pvc.namespace.clone(),
            })?;

        let target = ObjectRef::namespaced(ObjectKind::PersistentVolumeClaim, &pvc.name, &pvc.namespace);
        let content = manifest::pvc_manifest(pvc, &class.name)?;

        let bound_wait = match class.binding_mode {
            BindingMode::Immediate => Some(self.wait(&target, Convergence::PvcBound)),
            // Binding happens once a consumer schedules
            BindingMode::WaitForFirstConsumer => None,
        };

        let consumers: Vec<WorkloadRef> = pvc
            .consumers
            .iter()
            .filter(|c| c.replicas > 0)
            .cloned()
            .collect();

        debug!(pvc = %target, storage_class = %class.name, "planned claim regeneration");

        Ok(Fragment {
            scale_down: consumers.clone(),
            deletes: vec![RemediationAction::delete(
                target.clone(),
                Some(self.wait(&target, Convergence::Absent)),
            )],
            applies: vec![RemediationAction::apply(content, vec![target], bound_wait)],
            adjustments: Vec::new(),
            scale_up: consumers,
        })
    }

    fn plan_pod(&self, pod: &PodInfo, shortage: &BTreeSet<ShortResource>) -> Result<Fragment> {
        let owner = pod.owner.as_ref().ok_or_else(|| KfError::UnmanagedPod {
            pod: pod.name.clone(),
            namespace: pod.namespace.clone(),
        })?;

        let reduced = self.reduce_requests(pod, shortage)?;

        debug!(
            deployment = %owner,
            namespace = %pod.namespace,
            containers = reduced.len(),
            "planned request reduction"
        );

        Ok(Fragment {
            adjustments: vec![Adjustment {
                namespace: pod.namespace.clone(),
                deployment: owner.clone(),
                containers: reduced,
                affected: vec![ObjectRef::namespaced(ObjectKind::Pod, &pod.name, &pod.namespace)],
            }],
            ..Default::default()
        })
    }

    /// Halve each short request, never below the policy floor
    ///
    /// Only changed requests are returned, so an apply touches nothing else.
    pub fn reduce_requests(
        &self,
        pod: &PodInfo,
        shortage: &BTreeSet<ShortResource>,
    ) -> Result<Vec<ContainerRequests>> {
        let memory_short = shortage.contains(&ShortResource::Memory);
        let cpu_short = shortage.contains(&ShortResource::Cpu);

        if !memory_short && !cpu_short {
            let names: Vec<String> = shortage.iter().map(|r| r.to_string()).collect();
            return Err(KfError::RequestsNotReducible {
                pod: pod.name.clone(),
                namespace: pod.namespace.clone(),
                reason: format!("only {} is short, which requests cannot fix", names.join(", ")),
            });
        }

        let reduced: Vec<ContainerRequests> = pod
            .containers
            .iter()
            .filter_map(|c| {
                let memory = c
                    .memory
                    .filter(|_| memory_short)
                    .and_then(|m| halve(m, self.policy.min_memory_bytes));
                let cpu = c
                    .cpu
                    .filter(|_| cpu_short)
                    .and_then(|m| halve(m, self.policy.min_cpu_millis));

                if memory.is_none() && cpu.is_none() {
                    return None;
                }
                Some(ContainerRequests {
                    name: c.name.clone(),
                    memory,
                    cpu,
                })
            })
            .collect();

        if reduced.is_empty() {
            return Err(KfError::RequestsNotReducible {
                pod: pod.name.clone(),
                namespace: pod.namespace.clone(),
                reason: format!(
                    "requests are unset or already at the minimum (memory {}, cpu {})",
                    format_memory(self.policy.min_memory_bytes),
                    format_cpu(self.policy.min_cpu_millis)
                ),
            });
        }

        Ok(reduced)
    }

    fn wait(&self, target: &ObjectRef, condition: Convergence) -> Wait {
        Wait {
            target: target.clone(),
            condition,
            timeout: self.policy.convergence_timeout,
        }
    }
}

/// Half of `current`, floored at `floor`; `None` when that changes nothing
fn halve(current: u64, floor: u64) -> Option<u64> {
    let next = (current / 2).max(floor);
    (next < current).then_some(next)
}

/// Lay fragments out stage by stage: scale-downs, deletes, claim applies,
/// request adjustments, scale-ups
///
/// Reductions of the same Deployment from several pods become one apply.
fn merge(fragments: Vec<Fragment>, errors: &mut Vec<PlanningError>) -> Vec<RemediationAction> {
    let mut actions = Vec::new();

    let mut seen = HashSet::new();
    for w in fragments.iter().flat_map(|f| &f.scale_down) {
        if seen.insert((&w.namespace, &w.name)) {
            actions.push(RemediationAction::scale(&w.name, &w.namespace, 0));
        }
    }

    actions.extend(fragments.iter().flat_map(|f| f.deletes.iter().cloned()));
    actions.extend(fragments.iter().flat_map(|f| f.applies.iter().cloned()));

    let mut adjusted: Vec<Adjustment> = Vec::new();
    for adjustment in fragments.iter().flat_map(|f| &f.adjustments) {
        match adjusted.iter_mut().find(|a| a.targets_same(adjustment)) {
            Some(existing) => existing.absorb(adjustment),
            None => adjusted.push(adjustment.clone()),
        }
    }
    for adjustment in adjusted {
        let target = ObjectRef::namespaced(
            ObjectKind::Deployment,
            &adjustment.deployment,
            &adjustment.namespace,
        );
        match manifest::deployment_requests_manifest(
            &adjustment.deployment,
            &adjustment.namespace,
            &adjustment.containers,
        ) {
            Ok(content) => actions.push(RemediationAction::apply(content, vec![target], None)),
            Err(error) => errors.push(PlanningError {
                rule: RuleId::PendingPodInsufficientResources,
                affected: adjustment.affected,
                error,
            }),
        }
    }

    let mut restored = HashSet::new();
    for w in fragments.iter().flat_map(|f| &f.scale_up) {
        if restored.insert((&w.namespace, &w.name)) {
            actions.push(RemediationAction::scale(&w.name, &w.namespace, w.replicas));
        }
    }

    actions
}
