use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "topology file not found. Looked in:\n\
        - $VPCFLOW_TOPOLOGY\n\
        - current directory: topology.local.yaml, topology.yaml, topology.yml\n\
        - ~/.config/vpcflow/topology.yaml\n\
        Pass the path explicitly with --yaml"
    )]
    TopologyFileNotFound,

    #[error("credentials file not found: {0}")]
    CredentialsNotFound(PathBuf),

    #[error("credentials file {path} has no [{section}] {key} entry")]
    MissingCredential {
        path: PathBuf,
        section: String,
        key: String,
    },

    #[error("unreadable credentials file {path}: {message}")]
    InvalidCredentials { path: PathBuf, message: String },

    #[error("invalid settings file {path}: {message}")]
    InvalidSettings { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
