//! Top-level topology document

use super::{
    InstanceTemplate, LoadBalancerSpec, NetworkAclSpec, SecurityGroupSpec, SshKeySpec, Zone,
    default_true, name_ref,
};
use crate::error::{Result, TopologyError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider API generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Generation {
    #[default]
    Gen1,
    Gen2,
}

impl Generation {
    pub fn number(self) -> u8 {
        match self {
            Generation::Gen1 => 1,
            Generation::Gen2 => 2,
        }
    }
}

impl TryFrom<u8> for Generation {
    type Error = TopologyError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Generation::Gen1),
            2 => Ok(Generation::Gen2),
            other => Err(TopologyError::UnsupportedGeneration(other)),
        }
    }
}

impl From<Generation> for u8 {
    fn from(generation: Generation) -> Self {
        generation.number()
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.number())
    }
}

/// Desired state of one VPC deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySpec {
    /// Region name (us-south, eu-de, ...)
    pub region: String,

    #[serde(default)]
    pub generation: Generation,

    /// Resource group the resources are created under
    #[serde(default)]
    pub resource_group: Option<String>,

    /// VPC name
    pub vpc: String,

    /// Gen1 only
    #[serde(default)]
    pub classic_access: bool,

    /// Network ACL used as the VPC default (gen1 VPC creation requires it)
    #[serde(default, deserialize_with = "name_ref")]
    pub default_network_acl: Option<String>,

    /// Name of the security group the provider creates with the VPC
    #[serde(default, deserialize_with = "name_ref")]
    pub default_security_group: Option<String>,

    #[serde(default)]
    pub network_acls: Vec<NetworkAclSpec>,

    #[serde(default)]
    pub security_groups: Vec<SecurityGroupSpec>,

    #[serde(default, alias = "sshkeys")]
    pub ssh_keys: Vec<SshKeySpec>,

    #[serde(default)]
    pub zones: Vec<Zone>,

    #[serde(default)]
    pub instance_templates: Vec<InstanceTemplate>,

    #[serde(default)]
    pub load_balancers: Vec<LoadBalancerSpec>,

    /// Suffix expanded instance names with `-<zone>`
    #[serde(default = "default_true")]
    pub zone_qualified_names: bool,
}

impl TopologySpec {
    pub fn template(&self, name: &str) -> Option<&InstanceTemplate> {
        self.instance_templates.iter().find(|t| t.name == name)
    }

    pub fn zone(&self, name: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.name == name)
    }

    /// Whether `name` is the network ACL the VPC uses as its default
    pub fn is_default_network_acl(&self, name: &str) -> bool {
        self.default_network_acl.as_deref() == Some(name)
    }

    pub fn is_default_security_group(&self, name: &str) -> bool {
        self.default_security_group.as_deref() == Some(name)
    }

    /// Presence checks the planner relies on
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(TopologyError::InvalidTopology(
                "region must not be empty".to_string(),
            ));
        }
        if self.vpc.trim().is_empty() {
            return Err(TopologyError::InvalidTopology(
                "vpc name must not be empty".to_string(),
            ));
        }
        if self.generation == Generation::Gen1 && self.default_network_acl.is_none() {
            return Err(TopologyError::InvalidTopology(
                "generation 1 topologies must name a default_network_acl".to_string(),
            ));
        }

        for zone in &self.zones {
            for subnet in &zone.subnets {
                for instance in &subnet.instances {
                    if instance.quantity == 0 {
                        return Err(TopologyError::InvalidTopology(format!(
                            "instance '{}' in subnet '{}' has quantity 0",
                            instance.name, subnet.name
                        )));
                    }
                    if self.template(&instance.template).is_none() {
                        return Err(TopologyError::UnknownTemplate {
                            instance: instance.name.clone(),
                            template: instance.template.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}
