use serde::{Deserialize, Serialize};
use std::fs;

use crate::paths;

/// Root configuration structure for dropship.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DropshipConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via dropship.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    #[serde(default = "default_deploy")]
    pub deploy: DeployDefaults,

    #[serde(default = "default_ssh")]
    pub ssh: SshDefaults,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            deploy: default_deploy(),
            ssh: default_ssh(),
        }
    }
}

/// Configuration for deploy, backup, and rollback operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployDefaults {
    /// Shared temporary-files root that staging directories are created under.
    #[serde(default = "default_staging_root")]
    pub staging_root: String,

    /// Files copied from the live target into staging before the swap.
    #[serde(default = "default_preserve_files")]
    pub preserve_files: Vec<String>,

    /// Destructive operations refuse target paths shorter than this.
    #[serde(default = "default_min_target_path_len")]
    pub min_target_path_len: usize,

    #[serde(default = "default_scp_flags")]
    pub scp_flags: Vec<String>,
}

/// Configuration for the SSH transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshDefaults {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_server_alive_interval")]
    pub server_alive_interval: u64,

    #[serde(default = "default_ssh_port")]
    pub default_port: u16,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_deploy() -> DeployDefaults {
    DeployDefaults {
        staging_root: default_staging_root(),
        preserve_files: default_preserve_files(),
        min_target_path_len: default_min_target_path_len(),
        scp_flags: default_scp_flags(),
    }
}

fn default_ssh() -> SshDefaults {
    SshDefaults {
        connect_timeout_secs: default_connect_timeout_secs(),
        server_alive_interval: default_server_alive_interval(),
        default_port: default_ssh_port(),
    }
}

fn default_staging_root() -> String {
    "/tmp".to_string()
}

fn default_preserve_files() -> Vec<String> {
    vec!["config.json".to_string()]
}

fn default_min_target_path_len() -> usize {
    5
}

fn default_scp_flags() -> Vec<String> {
    vec!["-O".to_string()]
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_server_alive_interval() -> u64 {
    15
}

pub(crate) fn default_ssh_port() -> u16 {
    22
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load defaults, merging file config with built-in defaults.
/// If dropship.json is missing or invalid, silently returns built-in defaults.
pub fn load_defaults() -> Defaults {
    load_config().defaults
}

/// Load the full dropship.json config, falling back to defaults on any error.
pub fn load_config() -> DropshipConfig {
    match load_config_from_file() {
        Ok(config) => config,
        Err(err) => {
            tracing::debug!(error = %err, "using built-in defaults");
            DropshipConfig::default()
        }
    }
}

fn load_config_from_file() -> crate::Result<DropshipConfig> {
    let path = paths::dropship_json()?;

    if !path.exists() {
        return Err(crate::Error::other("dropship.json not found"));
    }

    let content = fs::read_to_string(&path).map_err(|e| {
        crate::Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| crate::Error::config_invalid_json(path.display().to_string(), e))
}
