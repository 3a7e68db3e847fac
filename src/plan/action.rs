//! Remediation actions

use crate::cluster::{Convergence, ObjectKind, ObjectRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Bounded wait for an object to reach a state after an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wait {
    pub target: ObjectRef,
    pub condition: Convergence,
    pub timeout: Duration,
}

/// One step of a remediation plan
///
/// Every variant carries what it needs to run on its own and can be
/// re-run safely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RemediationAction {
    DeleteObject {
        target: ObjectRef,
        wait: Option<Wait>,
    },
    ApplyManifest {
        content: String,
        /// Objects the manifest declares, for reporting
        objects: Vec<ObjectRef>,
        wait: Option<Wait>,
    },
    ScaleDeployment {
        name: String,
        namespace: String,
        replicas: i32,
    },
}

impl RemediationAction {
    pub fn delete(target: ObjectRef, wait: Option<Wait>) -> Self {
        RemediationAction::DeleteObject { target, wait }
    }

    pub fn apply(content: String, objects: Vec<ObjectRef>, wait: Option<Wait>) -> Self {
        RemediationAction::ApplyManifest {
            content,
            objects,
            wait,
        }
    }

    pub fn scale(name: impl Into<String>, namespace: impl Into<String>, replicas: i32) -> Self {
        RemediationAction::ScaleDeployment {
            name: name.into(),
            namespace: namespace.into(),
            replicas,
        }
    }

    /// Wait attached to this action, if it needs the cluster to converge
    pub fn wait(&self) -> Option<&Wait> {
        match self {
            RemediationAction::DeleteObject { wait, .. } => wait.as_ref(),
            RemediationAction::ApplyManifest { wait, .. } => wait.as_ref(),
            RemediationAction::ScaleDeployment { .. } => None,
        }
    }

    /// Short label ("delete", "apply", "scale")
    pub fn verb(&self) -> &'static str {
        match self {
            RemediationAction::DeleteObject { .. } => "delete",
            RemediationAction::ApplyManifest { .. } => "apply",
            RemediationAction::ScaleDeployment { .. } => "scale",
        }
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemediationAction::DeleteObject { target, .. } => write!(f, "delete {}", target),
            RemediationAction::ApplyManifest { objects, .. } => {
                let names: Vec<String> = objects.iter().map(|o| o.to_string()).collect();
                write!(f, "apply {}", names.join(", "))
            }
            RemediationAction::ScaleDeployment {
                name,
                namespace,
                replicas,
            } => write!(
                f,
                "scale {} to {} replicas",
                ObjectRef::namespaced(ObjectKind::Deployment, name, namespace),
                replicas
            ),
        }
    }
}
