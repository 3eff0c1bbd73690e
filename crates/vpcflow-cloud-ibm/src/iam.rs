//! API key → bearer token exchange
//!
//! The token is obtained once per run and never refreshed.

use crate::error::{IbmError, Result};
use serde::Deserialize;
use tracing::{debug, info};

pub const API_KEY_GRANT: &str = "urn:ibm:params:oauth:grant-type:apikey";

#[derive(Clone, Deserialize)]
pub struct BearerToken {
    pub access_token: String,

    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Exchange `api_key` for a bearer token at `{iam_endpoint}/identity/token`
pub async fn exchange_api_key(
    http: &reqwest::Client,
    iam_endpoint: &str,
    api_key: &str,
) -> Result<BearerToken> {
    let url = format!("{}/identity/token", iam_endpoint.trim_end_matches('/'));
    debug!(url = %url, "Requesting IAM token");

    let response = http
        .post(&url)
        .header("Accept", "application/json")
        .form(&[("grant_type", API_KEY_GRANT), ("apikey", api_key)])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(IbmError::TokenExchange {
            status: status.as_u16(),
            body,
        });
    }

    let token: BearerToken = response.json().await?;
    if token.access_token.is_empty() {
        return Err(IbmError::MissingAccessToken);
    }
    info!("IAM token obtained");
    Ok(token)
}
