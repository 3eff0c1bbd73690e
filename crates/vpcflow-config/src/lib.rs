pub mod credentials;
pub mod error;
pub mod settings;

pub use credentials::{API_KEY_ENV, DEFAULT_CREDENTIALS_FILE, find_credentials_file, read_api_key};
pub use error::*;
pub use settings::{Settings, WaitOverride, WaitOverrides, load_settings};

use std::path::{Path, PathBuf};

const APP_DIR: &str = "vpcflow";
const TOPOLOGY_ENV: &str = "VPCFLOW_TOPOLOGY";
const TOPOLOGY_CANDIDATES: [&str; 3] = ["topology.local.yaml", "topology.yaml", "topology.yml"];

/// Locate the topology document
///
/// Search order:
/// 1. `explicit` (the `--yaml` flag)
/// 2. `VPCFLOW_TOPOLOGY`
/// 3. current directory: topology.local.yaml, topology.yaml, topology.yml
/// 4. ~/.config/vpcflow/topology.yaml
pub fn find_topology_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::TopologyFileNotFound);
    }

    if let Ok(env_path) = std::env::var(TOPOLOGY_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    for filename in &TOPOLOGY_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join(APP_DIR).join("topology.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::TopologyFileNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial]
    fn test_find_topology_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        fs::write(temp_dir.path().join("topology.yaml"), "# test").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset(TOPOLOGY_ENV, || find_topology_file(None));
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("topology.yaml"));
    }

    #[test]
    #[serial]
    fn test_local_file_takes_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        fs::write(temp_dir.path().join("topology.yaml"), "# shared").unwrap();
        fs::write(temp_dir.path().join("topology.local.yaml"), "# local").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset(TOPOLOGY_ENV, || find_topology_file(None));
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("topology.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_env_var_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("custom.yaml");
        fs::write(&path, "# custom").unwrap();

        let result = temp_env::with_var(TOPOLOGY_ENV, Some(path.to_str().unwrap()), || {
            find_topology_file(None)
        });
        assert_eq!(result.unwrap(), path);
    }

    #[test]
    fn test_explicit_missing_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing.yaml");
        assert!(matches!(
            find_topology_file(Some(&missing)),
            Err(ConfigError::TopologyFileNotFound)
        ));
    }
}
