use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to read {path}: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("topology document is empty")]
    Empty,

    #[error("unsupported generation: {0} (expected 1 or 2)")]
    UnsupportedGeneration(u8),

    #[error("instance '{instance}' references unknown template '{template}'")]
    UnknownTemplate { instance: String, template: String },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),
}

pub type Result<T> = std::result::Result<T, TopologyError>;
