//! Tool settings (`settings.yaml`)
//!
//! Endpoints, API version and poll tuning. Every field is optional in the
//! file; missing fields keep the defaults below.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SETTINGS_ENV: &str = "VPCFLOW_SETTINGS";
const SETTINGS_FILE: &str = "settings.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub iam_endpoint: String,

    /// Used for gen2, and for gen1 until the region reports its own endpoint
    pub iaas_endpoint: String,

    pub resource_controller_endpoint: String,

    /// `version=` query parameter
    pub api_version: String,

    pub http_timeout_secs: u64,

    pub waits: WaitOverrides,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            iam_endpoint: "https://iam.cloud.ibm.com".to_string(),
            iaas_endpoint: "https://us-south.iaas.cloud.ibm.com".to_string(),
            resource_controller_endpoint: "https://resource-controller.cloud.ibm.com".to_string(),
            api_version: "2019-06-04".to_string(),
            http_timeout_secs: 30,
            waits: WaitOverrides::default(),
        }
    }
}

/// Per-wait overrides; `None` keeps the built-in policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitOverrides {
    pub subnet_available: Option<WaitOverride>,
    pub subnet_deleted: Option<WaitOverride>,
    pub instance_running: Option<WaitOverride>,
    pub instance_stopped: Option<WaitOverride>,
    pub instance_deleted: Option<WaitOverride>,
    pub floating_ip_available: Option<WaitOverride>,
    pub vpn_gateway_available: Option<WaitOverride>,
    pub vpn_gateway_deleted: Option<WaitOverride>,
    pub load_balancer_deleted: Option<WaitOverride>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitOverride {
    pub interval_secs: Option<u64>,

    /// `0` means unbounded
    pub max_attempts: Option<u32>,
}

/// Load settings from `explicit`, `VPCFLOW_SETTINGS`, or
/// `~/.config/vpcflow/settings.yaml`; defaults when none exists
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let Some(path) = settings_path(explicit) else {
        tracing::debug!("No settings file, using defaults");
        return Ok(Settings::default());
    };

    let content = std::fs::read_to_string(&path)?;
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }

    let settings: Settings =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::InvalidSettings {
            path: path.clone(),
            message: e.to_string(),
        })?;
    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

fn settings_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(env_path) = std::env::var(SETTINGS_ENV) {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("vpcflow").join(SETTINGS_FILE))
        .filter(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_partial_settings_keep_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(
            &path,
            "api_version: \"2020-01-01\"\nwaits:\n  instance_stopped:\n    interval_secs: 2\n    max_attempts: 60\n",
        )
        .unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.api_version, "2020-01-01");
        assert_eq!(settings.http_timeout_secs, 30);
        assert_eq!(settings.iam_endpoint, "https://iam.cloud.ibm.com");
        assert_eq!(
            settings.waits.instance_stopped,
            Some(WaitOverride {
                interval_secs: Some(2),
                max_attempts: Some(60),
            })
        );
        assert!(settings.waits.subnet_available.is_none());
    }

    #[test]
    fn test_invalid_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "http_timeout_secs: soon\n").unwrap();

        assert!(matches!(
            load_settings(Some(&path)),
            Err(ConfigError::InvalidSettings { .. })
        ));
    }

    #[test]
    fn test_empty_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "").unwrap();
        assert_eq!(load_settings(Some(&path)).unwrap(), Settings::default());
    }
}
