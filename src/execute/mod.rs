//! Plan execution
//!
//! Actions run strictly in order. The first failure is recorded, every
//! later action is marked not attempted, and execution stops. Nothing is
//! retried here; [`ExecutionReport::unfinished`] hands the rest of the plan
//! back to a caller that wants to try again.

use crate::cluster::{ControlPlane, DeleteOutcome};
use crate::error::{KfError, Result};
use crate::plan::{RemediationAction, Wait};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// What happened to one action
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionStatus {
    Succeeded {
        detail: String,
    },
    Failed {
        #[serde(serialize_with = "crate::error::serialize_display")]
        error: KfError,
    },
    NotAttempted,
}

#[derive(Debug, Serialize)]
pub struct ActionOutcome {
    pub action: RemediationAction,
    #[serde(flatten)]
    pub status: ActionStatus,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, ActionStatus::Succeeded { .. })
    }

    pub fn failed(&self) -> bool {
        matches!(self.status, ActionStatus::Failed { .. })
    }
}

/// Per-action record of a plan run
#[derive(Debug, Serialize)]
pub struct ExecutionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ActionOutcome>,
}

impl ExecutionReport {
    /// Every action ran and succeeded
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(ActionOutcome::succeeded)
    }

    /// Index of the action that stopped the run
    pub fn halted_at(&self) -> Option<usize> {
        self.outcomes.iter().position(ActionOutcome::failed)
    }

    /// Error that stopped the run
    pub fn failure(&self) -> Option<&KfError> {
        self.outcomes.iter().find_map(|o| match &o.status {
            ActionStatus::Failed { error } => Some(error),
            _ => None,
        })
    }

    /// The failed action and everything after it, in plan order
    pub fn unfinished(&self) -> Vec<RemediationAction> {
        match self.halted_at() {
            Some(idx) => self.outcomes[idx..].iter().map(|o| o.action.clone()).collect(),
            None => Vec::new(),
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }
}

/// Runs remediation plans against a control plane
pub struct Executor<'a> {
    cluster: &'a dyn ControlPlane,
    deadline: Option<Instant>,
}

impl<'a> Executor<'a> {
    pub fn new(cluster: &'a dyn ControlPlane) -> Self {
        Self {
            cluster,
            deadline: None,
        }
    }

    /// Bound the whole run; action waits are cut short to fit
    pub fn with_deadline(mut self, budget: Duration) -> Self {
        self.deadline = Some(Instant::now() + budget);
        self
    }

    pub async fn apply(&self, actions: &[RemediationAction]) -> ExecutionReport {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(actions.len());
        let mut halted = false;

        for (idx, action) in actions.iter().enumerate() {
            if halted {
                outcomes.push(ActionOutcome {
                    action: action.clone(),
                    status: ActionStatus::NotAttempted,
                });
                continue;
            }

            info!(step = idx + 1, total = actions.len(), "{}", action);
            let status = match self.run(action).await {
                Ok(detail) => ActionStatus::Succeeded { detail },
                Err(error) => {
                    warn!(step = idx + 1, "{} failed: {}", action, error);
                    halted = true;
                    ActionStatus::Failed { error }
                }
            };

            outcomes.push(ActionOutcome {
                action: action.clone(),
                status,
            });
        }

        ExecutionReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
        }
    }

    async fn run(&self, action: &RemediationAction) -> Result<String> {
        if self.remaining() == Some(Duration::ZERO) {
            return Err(KfError::RemediationTimeout {
                action: action.to_string(),
                waited: Duration::ZERO,
            });
        }

        let detail = match action {
            RemediationAction::DeleteObject { target, .. } => {
                match self.cluster.delete(target).await.map_err(|e| wrap(action, e))? {
                    DeleteOutcome::Deleted => format!("{} deleted", target),
                    DeleteOutcome::AlreadyAbsent => format!("{} already absent", target),
                }
            }
            RemediationAction::ApplyManifest { content, .. } => {
                let applied = self.cluster.apply(content).await.map_err(|e| wrap(action, e))?;
                let names: Vec<String> = applied.iter().map(|o| o.to_string()).collect();
                format!("{} configured", names.join(", "))
            }
            RemediationAction::ScaleDeployment {
                name,
                namespace,
                replicas,
            } => {
                self.cluster
                    .scale_deployment(name, namespace, *replicas)
                    .await
                    .map_err(|e| wrap(action, e))?;
                format!("deployment/{} scaled to {}", name, replicas)
            }
        };

        if let Some(wait) = action.wait() {
            self.await_convergence(action, wait).await?;
        }

        Ok(detail)
    }

    async fn await_convergence(&self, action: &RemediationAction, wait: &Wait) -> Result<()> {
        let budget = match self.remaining() {
            Some(left) => wait.timeout.min(left),
            None => wait.timeout,
        };

        let pending = self.cluster.await_convergence(&wait.target, &wait.condition);
        match tokio::time::timeout(budget, pending).await {
            Ok(result) => result.map_err(|e| wrap(action, e)),
            Err(_) => Err(KfError::RemediationTimeout {
                action: format!("{} of {}", wait.condition, wait.target),
                waited: budget,
            }),
        }
    }

    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

/// Attach the action to a control-plane error
fn wrap(action: &RemediationAction, err: KfError) -> KfError {
    match err {
        e @ (KfError::ActionFailed { .. }
        | KfError::RemediationTimeout { .. }
        | KfError::ClusterUnreachable(_)) => e,
        other => KfError::ActionFailed {
            action: action.to_string(),
            reason: other.to_string(),
        },
    }
}
