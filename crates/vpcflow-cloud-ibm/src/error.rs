//! IBM provider error types

use thiserror::Error;
use vpcflow_cloud::ProviderError;

#[derive(Error, Debug)]
pub enum IbmError {
    #[error("IAM token exchange failed with HTTP {status}: {body}")]
    TokenExchange { status: u16, body: String },

    #[error("IAM response did not contain an access token")]
    MissingAccessToken,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl From<IbmError> for ProviderError {
    fn from(err: IbmError) -> Self {
        match err {
            IbmError::Provider(inner) => inner,
            other => ProviderError::Authentication(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, IbmError>;
