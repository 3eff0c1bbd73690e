//! API key discovery
//!
//! The key lives in an ini file under `[API]` as `apikey = ...`, or in the
//! `IC_API_KEY` environment variable.

use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_CREDENTIALS_FILE: &str = "provision-vpc.ini";
pub const API_KEY_ENV: &str = "IC_API_KEY";

const CREDENTIALS_ENV: &str = "VPCFLOW_CREDENTIALS";
const API_SECTION: &str = "API";
const API_KEY: &str = "apikey";

/// Locate the credentials file
///
/// `explicit` → `VPCFLOW_CREDENTIALS` → `./provision-vpc.ini` →
/// `~/.config/vpcflow/provision-vpc.ini`
pub fn find_credentials_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return existing(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CREDENTIALS_ENV) {
        return existing(PathBuf::from(env_path));
    }

    let local = std::env::current_dir()?.join(DEFAULT_CREDENTIALS_FILE);
    if local.exists() {
        return Ok(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("vpcflow").join(DEFAULT_CREDENTIALS_FILE);
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::CredentialsNotFound(local))
}

fn existing(path: PathBuf) -> Result<PathBuf> {
    if path.exists() {
        Ok(path)
    } else {
        Err(ConfigError::CredentialsNotFound(path))
    }
}

/// Read `[API] apikey` from an ini file
///
/// Section and key names are matched case-insensitively.
pub fn read_api_key(path: &Path) -> Result<String> {
    let missing = || ConfigError::MissingCredential {
        path: path.to_path_buf(),
        section: API_SECTION.to_string(),
        key: API_KEY.to_string(),
    };

    let ini = config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Ini))
        .build()
        .map_err(|e| ConfigError::InvalidCredentials {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    match ini.get_string(&format!("{}.{}", API_SECTION.to_lowercase(), API_KEY)) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        Ok(_) | Err(config::ConfigError::NotFound(_)) => Err(missing()),
        Err(e) => Err(ConfigError::InvalidCredentials {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}
