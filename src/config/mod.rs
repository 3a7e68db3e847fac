//! Application configuration for kubefix

use crate::error::{KfError, Result};
use crate::inspect::quantity::{parse_cpu, parse_memory};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration stored in ~/.kubefix/config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// StorageClasses to prefer, in order, when regenerating a PVC
    #[serde(default = "default_preferred_storage_classes")]
    pub preferred_storage_classes: Vec<String>,

    /// Lowest memory request the planner will reduce a container to
    #[serde(default = "default_min_memory_request")]
    pub min_memory_request: String,

    /// Lowest CPU request the planner will reduce a container to
    #[serde(default = "default_min_cpu_request")]
    pub min_cpu_request: String,

    /// Wait budget per action for cluster convergence, in seconds
    #[serde(default = "default_convergence_timeout")]
    pub convergence_timeout_secs: u64,

    /// Overall remediation deadline, in seconds
    #[serde(default = "default_deadline")]
    pub deadline_secs: u64,

    /// Field manager used for server-side apply
    #[serde(default = "default_field_manager")]
    pub field_manager: String,

    /// Whether to use colors
    #[serde(default = "default_true")]
    pub colors: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            preferred_storage_classes: default_preferred_storage_classes(),
            min_memory_request: default_min_memory_request(),
            min_cpu_request: default_min_cpu_request(),
            convergence_timeout_secs: default_convergence_timeout(),
            deadline_secs: default_deadline(),
            field_manager: default_field_manager(),
            colors: true,
        }
    }
}

fn default_preferred_storage_classes() -> Vec<String> {
    ["standard-rwo", "premium-rwo", "gp3", "managed-csi"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_memory_request() -> String {
    "256Mi".to_string()
}

fn default_min_cpu_request() -> String {
    "100m".to_string()
}

fn default_convergence_timeout() -> u64 {
    120
}

fn default_deadline() -> u64 {
    900
}

fn default_field_manager() -> String {
    "kubefix".to_string()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Minimum memory request in bytes
    pub fn min_memory_bytes(&self) -> Result<u64> {
        parse_memory(&self.min_memory_request).ok_or_else(|| {
            KfError::Config(format!(
                "min_memory_request is not a valid quantity: {}",
                self.min_memory_request
            ))
        })
    }

    /// Minimum CPU request in millicores
    pub fn min_cpu_millis(&self) -> Result<u64> {
        parse_cpu(&self.min_cpu_request).ok_or_else(|| {
            KfError::Config(format!(
                "min_cpu_request is not a valid quantity: {}",
                self.min_cpu_request
            ))
        })
    }

    /// Reject values that would make every plan fail
    pub fn validate(&self) -> Result<()> {
        self.min_memory_bytes()?;
        self.min_cpu_millis()?;
        if self.convergence_timeout_secs == 0 {
            return Err(KfError::Config(
                "convergence_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.deadline_secs == 0 {
            return Err(KfError::Config(
                "deadline_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn convergence_timeout(&self) -> Duration {
        Duration::from_secs(self.convergence_timeout_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Get the kubefix config directory (~/.kubefix)
pub fn config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join(".kubefix"))
        .ok_or_else(|| KfError::Config("Could not determine home directory".to_string()))
}

/// Load application config from ~/.kubefix/config.toml
pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_dir()?.join("config.toml"))
}

/// Load application config from an explicit path, falling back to defaults
/// when the file does not exist
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&content).map_err(|e| KfError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    } else {
        Ok(AppConfig::default())
    }
}
