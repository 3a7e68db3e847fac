//! Error types for kubefix

use std::time::Duration;
use thiserror::Error;

/// Main error type for kubefix
#[derive(Debug, Error)]
pub enum KfError {
    #[error("Cluster unreachable: {0}")]
    ClusterUnreachable(String),

    #[error("No viable StorageClass for PVC {namespace}/{pvc}: no preferred class is installed and the cluster declares no default")]
    NoViableStorageClass { pvc: String, namespace: String },

    #[error("Pod {namespace}/{pod} is not managed by a Deployment; its requests cannot be regenerated")]
    UnmanagedPod { pod: String, namespace: String },

    #[error("Requests of pod {namespace}/{pod} cannot be reduced further: {reason}")]
    RequestsNotReducible {
        pod: String,
        namespace: String,
        reason: String,
    },

    #[error("Timed out after {}s waiting for {action}", .waited.as_secs())]
    RemediationTimeout { action: String, waited: Duration },

    #[error("Action failed: {action}: {reason}")]
    ActionFailed { action: String, reason: String },

    #[error("Kubernetes API error: {0}")]
    Kube(kube::Error),

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl KfError {
    /// Whether this error makes the remainder of a run pointless
    pub fn is_fatal(&self) -> bool {
        matches!(self, KfError::ClusterUnreachable(_))
    }
}

/// A kube client error is an API response or a control plane that never
/// answered; the latter aborts the whole run, on reads and writes alike.
impl From<kube::Error> for KfError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(_) | kube::Error::SerdeError(_) => KfError::Kube(err),
            other => KfError::ClusterUnreachable(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for KfError {
    fn from(e: serde_json::Error) -> Self {
        KfError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KfError {
    fn from(e: serde_yaml::Error) -> Self {
        KfError::Serialization(e.to_string())
    }
}

/// Serialize an error (or anything displayable) as its message
pub fn serialize_display<T: std::fmt::Display, S: serde::Serializer>(
    value: &T,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(value)
}

/// Result type alias for kubefix
pub type Result<T> = std::result::Result<T, KfError>;
