//! Network resources: ACLs, security groups, zones, subnets, VPN

use super::InstanceDescriptor;
use serde::{Deserialize, Serialize};

/// Stateless packet filter applied at the subnet boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkAclSpec {
    #[serde(alias = "network_acl")]
    pub name: String,

    #[serde(default)]
    pub rules: Vec<AclRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclRule {
    pub name: String,

    /// allow / deny
    pub action: String,

    /// inbound / outbound
    pub direction: String,

    pub source: String,

    pub destination: String,

    /// all / tcp / udp / icmp
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default)]
    pub port_min: Option<u16>,

    #[serde(default)]
    pub port_max: Option<u16>,
}

/// Stateful rule set applied at the instance interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    #[serde(alias = "security_group")]
    pub name: String,

    #[serde(default)]
    pub rules: Vec<SecurityGroupRule>,
}

impl SecurityGroupSpec {
    /// Names of other security groups this one references as rule remotes
    pub fn remote_groups(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .filter_map(|r| r.remote_security_group.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    /// inbound / outbound
    pub direction: String,

    #[serde(default = "default_ip_version")]
    pub ip_version: String,

    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default)]
    pub port_min: Option<u16>,

    #[serde(default)]
    pub port_max: Option<u16>,

    #[serde(default)]
    pub remote_cidr: Option<String>,

    #[serde(default)]
    pub remote_address: Option<String>,

    /// Resolved to an id when the create request is built
    #[serde(default)]
    pub remote_security_group: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKeySpec {
    #[serde(alias = "sshkey")]
    pub name: String,

    pub public_key: String,

    #[serde(default = "default_key_type")]
    pub key_type: String,
}

/// Availability zone and the subnets placed in it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,

    #[serde(default, alias = "address_prefix_cidr")]
    pub address_prefix: Option<String>,

    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subnet {
    #[serde(alias = "subnet")]
    pub name: String,

    pub ipv4_cidr_block: String,

    #[serde(default)]
    pub network_acl: Option<String>,

    #[serde(default, alias = "publicGateway")]
    pub public_gateway: bool,

    #[serde(default)]
    pub vpn: Vec<VpnGatewaySpec>,

    #[serde(default)]
    pub instances: Vec<InstanceDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpnGatewaySpec {
    pub name: String,

    #[serde(default)]
    pub connections: Vec<VpnConnectionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpnConnectionSpec {
    pub name: String,

    pub peer_address: String,

    #[serde(alias = "preshared_key")]
    pub psk: String,

    #[serde(default)]
    pub local_cidrs: Vec<String>,

    #[serde(default)]
    pub peer_cidrs: Vec<String>,
}

fn default_protocol() -> String {
    "all".to_string()
}

fn default_ip_version() -> String {
    "ipv4".to_string()
}

fn default_key_type() -> String {
    "rsa".to_string()
}
