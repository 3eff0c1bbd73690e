//! Engine error types

use crate::classify::{ErrorClass, Verb};
use crate::resource::ResourceKind;
use thiserror::Error;

/// Failure reported by a provider client
///
/// `Status` keeps the response body verbatim so the operator sees exactly
/// what the provider said.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("{method} {url} failed: {message}")]
    Transport {
        method: String,
        url: String,
        message: String,
    },

    #[error("Unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("{kind} is not supported by {dialect}")]
    Unsupported { kind: ResourceKind, dialect: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("{kind} requests need a parent identifier")]
    MissingParent { kind: ResourceKind },
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Reason a reconciliation run stopped
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Failed to {verb} {kind} '{name}' ({class}): {source}")]
    Provider {
        verb: Verb,
        kind: ResourceKind,
        name: String,
        class: ErrorClass,
        #[source]
        source: ProviderError,
    },

    #[error("Timed out waiting for {kind} '{name}' to become {state} after {attempts} attempts")]
    WaitTimedOut {
        kind: ResourceKind,
        name: String,
        state: String,
        attempts: u32,
    },

    #[error("{kind} '{name}' does not exist")]
    MissingDependency { kind: ResourceKind, name: String },

    #[error("Region '{region}' is not available (status: {status})")]
    RegionUnavailable { region: String, status: String },

    #[error("{kind} '{name}': {message}")]
    UnexpectedState {
        kind: ResourceKind,
        name: String,
        message: String,
    },
}

impl ReconcileError {
    pub fn provider(
        verb: Verb,
        kind: ResourceKind,
        name: impl Into<String>,
        source: ProviderError,
    ) -> Self {
        ReconcileError::Provider {
            verb,
            kind,
            name: name.into(),
            class: crate::classify::classify_error(&source),
            source,
        }
    }

    pub fn missing(kind: ResourceKind, name: impl Into<String>) -> Self {
        ReconcileError::MissingDependency {
            kind,
            name: name.into(),
        }
    }

    /// Whether re-running the same command may succeed without changes
    pub fn is_transient(&self) -> bool {
        match self {
            ReconcileError::Provider { class, .. } => class.is_transient(),
            ReconcileError::WaitTimedOut { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
