//! Kubernetes client construction

use crate::error::{KfError, Result};
use kube::{config::KubeConfigOptions, Client, Config};

/// Create a Kubernetes client for the specified context
///
/// A kubeconfig that cannot produce a client leaves nothing to inspect, so
/// every failure here is reported as an unreachable cluster.
pub async fn create_client(context: Option<&str>) -> Result<Client> {
    let config = load_config(context).await?;
    Client::try_from(config).map_err(|e| KfError::ClusterUnreachable(e.to_string()))
}

/// Load Kubernetes configuration
async fn load_config(context: Option<&str>) -> Result<Config> {
    let options = KubeConfigOptions {
        context: context.map(String::from),
        ..Default::default()
    };

    Config::from_kubeconfig(&options)
        .await
        .map_err(|e| KfError::ClusterUnreachable(format!("Failed to load kubeconfig: {e}")))
}

/// Get the current context name
pub fn current_context() -> Result<String> {
    let kubeconfig = kube::config::Kubeconfig::read()
        .map_err(|e| KfError::Config(format!("Failed to read kubeconfig: {e}")))?;

    kubeconfig
        .current_context
        .ok_or_else(|| KfError::Config("No current context in kubeconfig".to_string()))
}
