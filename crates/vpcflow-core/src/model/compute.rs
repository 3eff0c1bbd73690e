//! Compute resources: instance descriptors and templates

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Instances to place in a subnet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    /// Name template; `%d` is replaced by the 1-based replica index
    pub name: String,

    #[serde(default = "default_quantity")]
    pub quantity: u32,

    /// Name of an entry in `instance_templates`
    pub template: String,

    #[serde(default)]
    pub security_group: Option<String>,

    #[serde(default, alias = "floatingIP")]
    pub floating_ip: bool,

    /// Load balancer pools this instance joins
    #[serde(default, alias = "in_lb_pool")]
    pub lb_pools: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceTemplate {
    pub name: String,

    pub image: String,

    pub profile: String,

    #[serde(alias = "sshkey")]
    pub ssh_key: String,

    /// cloud-init payload
    #[serde(default)]
    pub user_data: Option<String>,

    /// Read into `user_data` by the loader, relative to the topology file
    #[serde(default)]
    pub user_data_file: Option<PathBuf>,

    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,

    #[serde(default)]
    pub bandwidth: Option<u32>,
}

/// Secondary data volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,

    #[serde(default = "default_volume_profile")]
    pub profile: String,

    /// GB
    pub capacity: u32,
}

fn default_quantity() -> u32 {
    1
}

fn default_volume_profile() -> String {
    "general-purpose".to_string()
}
