//! Per-run request context

use vpcflow_cloud::ApiDialect;

/// Everything a request needs besides its path and body
///
/// Built once after the token exchange and never mutated afterwards. The
/// gen1 endpoint swap produces a new value.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub endpoint: String,
    pub resource_controller: String,
    pub api_version: String,
    pub dialect: ApiDialect,
    token: String,
}

impl ProviderContext {
    pub fn new(
        endpoint: impl Into<String>,
        resource_controller: impl Into<String>,
        api_version: impl Into<String>,
        dialect: ApiDialect,
        token: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: trim(endpoint.into()),
            resource_controller: trim(resource_controller.into()),
            api_version: api_version.into(),
            dialect,
            token: token.into(),
        }
    }

    /// Same context pointed at another IaaS endpoint
    pub fn with_endpoint(&self, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: trim(endpoint.into()),
            ..self.clone()
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn query(&self) -> String {
        self.dialect.query(&self.api_version)
    }

    /// Absolute IaaS URL for `path` with the version query attached
    pub fn url(&self, path: &str) -> String {
        format!("{}{}?{}", self.endpoint, path, self.query())
    }
}

fn trim(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}
