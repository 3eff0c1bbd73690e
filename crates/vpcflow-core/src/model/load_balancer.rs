//! Load balancer definitions

use super::default_true;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancerSpec {
    #[serde(alias = "lbInstance")]
    pub name: String,

    #[serde(default = "default_true", alias = "is_public")]
    pub public: bool,

    /// Subnet names the load balancer is placed in
    #[serde(default)]
    pub subnets: Vec<String>,

    #[serde(default)]
    pub listeners: Vec<ListenerSpec>,

    #[serde(default)]
    pub pools: Vec<PoolSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerSpec {
    pub port: u16,

    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default)]
    pub default_pool: Option<String>,

    #[serde(default)]
    pub connection_limit: Option<u32>,
}

/// Backend pool; members are the instances whose `lb_pools` name this pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSpec {
    pub name: String,

    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default = "default_member_port")]
    pub member_port: u16,

    #[serde(default)]
    pub health_monitor: HealthMonitorSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMonitorSpec {
    #[serde(default = "default_delay")]
    pub delay: u32,

    #[serde(default = "default_retries")]
    pub max_retries: u32,

    #[serde(default = "default_timeout")]
    pub timeout: u32,

    #[serde(rename = "type", default = "default_protocol")]
    pub kind: String,

    #[serde(default)]
    pub url_path: Option<String>,
}

impl Default for HealthMonitorSpec {
    fn default() -> Self {
        Self {
            delay: default_delay(),
            max_retries: default_retries(),
            timeout: default_timeout(),
            kind: default_protocol(),
            url_path: None,
        }
    }
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_algorithm() -> String {
    "round_robin".to_string()
}

fn default_member_port() -> u16 {
    80
}

fn default_delay() -> u32 {
    5
}

fn default_retries() -> u32 {
    2
}

fn default_timeout() -> u32 {
    2
}
