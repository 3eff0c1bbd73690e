//! Credentials, settings and provider session setup

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use vpcflow_cloud::{ApiDialect, PollPolicy, ProviderClient, WaitSettings};
use vpcflow_cloud_ibm::{ConnectOptions, IbmVpcClient};
use vpcflow_config::{API_KEY_ENV, Settings, WaitOverride};

/// API key from `explicit` file, `IC_API_KEY`, or the discovered credentials file
pub fn api_key(explicit: Option<&Path>) -> anyhow::Result<String> {
    if explicit.is_none() {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Ok(key.trim().to_string());
            }
        }
    }
    let path = vpcflow_config::find_credentials_file(explicit)?;
    let key = vpcflow_config::read_api_key(&path)
        .with_context(|| format!("Failed to read API key from {}", path.display()))?;
    Ok(key)
}

fn apply(policy: PollPolicy, wait: &Option<WaitOverride>) -> PollPolicy {
    match wait {
        Some(wait) => policy.with_override(wait.interval_secs, wait.max_attempts),
        None => policy,
    }
}

pub fn wait_settings(settings: &Settings) -> WaitSettings {
    let defaults = WaitSettings::default();
    let waits = &settings.waits;
    WaitSettings {
        subnet_available: apply(defaults.subnet_available, &waits.subnet_available),
        subnet_deleted: apply(defaults.subnet_deleted, &waits.subnet_deleted),
        instance_running: apply(defaults.instance_running, &waits.instance_running),
        instance_stopped: apply(defaults.instance_stopped, &waits.instance_stopped),
        instance_deleted: apply(defaults.instance_deleted, &waits.instance_deleted),
        floating_ip_available: apply(defaults.floating_ip_available, &waits.floating_ip_available),
        vpn_gateway_available: apply(defaults.vpn_gateway_available, &waits.vpn_gateway_available),
        vpn_gateway_deleted: apply(defaults.vpn_gateway_deleted, &waits.vpn_gateway_deleted),
        load_balancer_deleted: apply(defaults.load_balancer_deleted, &waits.load_balancer_deleted),
    }
}

/// Exchange the API key and open a provider session for `region`
pub async fn connect(
    settings: &Settings,
    api_key: String,
    region: &str,
    dialect: ApiDialect,
) -> anyhow::Result<Arc<dyn ProviderClient>> {
    let options = ConnectOptions {
        api_key,
        region: region.to_string(),
        dialect,
        iam_endpoint: settings.iam_endpoint.clone(),
        iaas_endpoint: settings.iaas_endpoint.clone(),
        resource_controller_endpoint: settings.resource_controller_endpoint.clone(),
        api_version: settings.api_version.clone(),
        timeout: Duration::from_secs(settings.http_timeout_secs),
    };
    let client = IbmVpcClient::connect(&options)
        .await
        .context("Failed to open a provider session")?;
    tracing::debug!(endpoint = %client.context().endpoint, %dialect, "Session ready");
    Ok(Arc::new(client))
}
