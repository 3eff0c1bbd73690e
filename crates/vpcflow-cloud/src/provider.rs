//! Provider client abstraction
//!
//! The engine only talks to the provider through [`ProviderClient`]. Every
//! request it issues carries already-resolved identifiers; the client never
//! looks anything up by name on its own.

use crate::error::ProviderError;
use crate::resource::{RemoteResource, ResourceKind, Scope};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vpcflow_core::{AclRule, HealthMonitorSpec, ListenerSpec, VolumeSpec};

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Uniform request surface over the provider's REST API
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Returns the provider name (e.g., "ibm-vpc")
    fn name(&self) -> &str;

    async fn region(&self, name: &str) -> ProviderResult<RegionInfo>;

    /// All resources of `kind` visible in `scope`
    async fn list(&self, kind: ResourceKind, scope: &Scope) -> ProviderResult<Vec<RemoteResource>>;

    async fn get(&self, kind: ResourceKind, id: &str, scope: &Scope)
    -> ProviderResult<RemoteResource>;

    async fn create(&self, request: &CreateRequest) -> ProviderResult<RemoteResource>;

    async fn delete(&self, kind: ResourceKind, id: &str, scope: &Scope) -> ProviderResult<()>;

    async fn attach_public_gateway(
        &self,
        subnet_id: &str,
        gateway_id: &str,
    ) -> ProviderResult<RemoteResource>;

    async fn detach_public_gateway(&self, subnet_id: &str) -> ProviderResult<()>;

    async fn stop_instance(&self, instance_id: &str) -> ProviderResult<()>;

    /// Floating IPs bound to any network interface of the instance
    async fn instance_floating_ips(&self, instance_id: &str)
    -> ProviderResult<Vec<AttachedFloatingIp>>;

    async fn detach_floating_ip(&self, attached: &AttachedFloatingIp) -> ProviderResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub name: String,
    pub status: String,
    pub endpoint: Option<String>,
}

impl RegionInfo {
    pub fn is_available(&self) -> bool {
        self.status == "available"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachedFloatingIp {
    pub instance_id: String,
    pub interface_id: String,
    pub floating_ip: RemoteResource,
}

/// A fully resolved create request
#[derive(Debug, Clone)]
pub enum CreateRequest {
    NetworkAcl {
        name: String,
        rules: Vec<AclRule>,
        resource_group_id: Option<String>,
    },
    Vpc {
        name: String,
        classic_access: bool,
        default_network_acl_id: Option<String>,
        resource_group_id: Option<String>,
    },
    SecurityGroup {
        name: String,
        vpc_id: String,
        rules: Vec<SecurityGroupRuleRequest>,
        resource_group_id: Option<String>,
    },
    SecurityGroupRule {
        group_id: String,
        rule: SecurityGroupRuleRequest,
    },
    SshKey {
        name: String,
        public_key: String,
        key_type: String,
        resource_group_id: Option<String>,
    },
    AddressPrefix {
        vpc_id: String,
        name: String,
        zone: String,
        cidr: String,
    },
    Subnet {
        name: String,
        vpc_id: String,
        zone: String,
        ipv4_cidr_block: String,
        network_acl_id: Option<String>,
        resource_group_id: Option<String>,
    },
    PublicGateway {
        name: String,
        vpc_id: String,
        zone: String,
        resource_group_id: Option<String>,
    },
    VpnGateway {
        name: String,
        subnet_id: String,
        resource_group_id: Option<String>,
    },
    VpnConnection {
        gateway_id: String,
        name: String,
        peer_address: String,
        psk: String,
        local_cidrs: Vec<String>,
        peer_cidrs: Vec<String>,
    },
    Instance(InstanceRequest),
    FloatingIp {
        name: String,
        target_interface_id: String,
        resource_group_id: Option<String>,
    },
    LoadBalancer(LoadBalancerRequest),
    Route {
        vpc_id: String,
        name: String,
        zone: String,
        destination: String,
        next_hop: String,
    },
}

impl CreateRequest {
    pub fn kind(&self) -> ResourceKind {
        match self {
            CreateRequest::NetworkAcl { .. } => ResourceKind::NetworkAcl,
            CreateRequest::Vpc { .. } => ResourceKind::Vpc,
            CreateRequest::SecurityGroup { .. } => ResourceKind::SecurityGroup,
            CreateRequest::SecurityGroupRule { .. } => ResourceKind::SecurityGroupRule,
            CreateRequest::SshKey { .. } => ResourceKind::SshKey,
            CreateRequest::AddressPrefix { .. } => ResourceKind::AddressPrefix,
            CreateRequest::Subnet { .. } => ResourceKind::Subnet,
            CreateRequest::PublicGateway { .. } => ResourceKind::PublicGateway,
            CreateRequest::VpnGateway { .. } => ResourceKind::VpnGateway,
            CreateRequest::VpnConnection { .. } => ResourceKind::VpnConnection,
            CreateRequest::Instance(_) => ResourceKind::Instance,
            CreateRequest::FloatingIp { .. } => ResourceKind::FloatingIp,
            CreateRequest::LoadBalancer(_) => ResourceKind::LoadBalancer,
            CreateRequest::Route { .. } => ResourceKind::Route,
        }
    }

    /// Name the created resource will carry
    pub fn name(&self) -> String {
        match self {
            CreateRequest::NetworkAcl { name, .. }
            | CreateRequest::Vpc { name, .. }
            | CreateRequest::SecurityGroup { name, .. }
            | CreateRequest::SshKey { name, .. }
            | CreateRequest::AddressPrefix { name, .. }
            | CreateRequest::Subnet { name, .. }
            | CreateRequest::PublicGateway { name, .. }
            | CreateRequest::VpnGateway { name, .. }
            | CreateRequest::VpnConnection { name, .. }
            | CreateRequest::FloatingIp { name, .. }
            | CreateRequest::Route { name, .. } => name.clone(),
            CreateRequest::SecurityGroupRule { rule, .. } => rule.signature(),
            CreateRequest::Instance(instance) => instance.name.clone(),
            CreateRequest::LoadBalancer(lb) => lb.name.clone(),
        }
    }
}

/// Security group rule with its remote group already resolved to an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRuleRequest {
    pub direction: String,
    pub ip_version: String,
    pub protocol: String,
    pub port_min: Option<u16>,
    pub port_max: Option<u16>,
    pub remote: RuleRemote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleRemote {
    Any,
    Cidr(String),
    Address(String),
    SecurityGroup(String),
}

impl SecurityGroupRuleRequest {
    /// Stable identity of a rule
    ///
    /// Rules carry no name on the provider side, so this string stands in
    /// for one when checking whether a rule already exists.
    pub fn signature(&self) -> String {
        rule_signature(
            &self.direction,
            &self.protocol,
            self.port_min,
            self.port_max,
            &self.remote,
        )
    }
}

pub fn rule_signature(
    direction: &str,
    protocol: &str,
    port_min: Option<u16>,
    port_max: Option<u16>,
    remote: &RuleRemote,
) -> String {
    let ports = match (port_min, port_max) {
        (None, None) => "any".to_string(),
        (min, max) => format!(
            "{}-{}",
            min.map(|p| p.to_string()).unwrap_or_default(),
            max.map(|p| p.to_string()).unwrap_or_default()
        ),
    };
    let remote = match remote {
        RuleRemote::Any => "any".to_string(),
        RuleRemote::Cidr(cidr) => cidr.clone(),
        RuleRemote::Address(address) => address.clone(),
        RuleRemote::SecurityGroup(id) => format!("sg:{}", id),
    };
    format!(
        "{}/{}/{}/{}",
        direction.to_lowercase(),
        protocol.to_lowercase(),
        ports,
        remote
    )
}

#[derive(Debug, Clone)]
pub struct InstanceRequest {
    pub name: String,
    pub zone: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub image_id: String,
    pub profile: String,
    pub key_id: String,
    pub security_group_ids: Vec<String>,
    pub user_data: Option<String>,
    pub volumes: Vec<VolumeSpec>,
    pub bandwidth: Option<u32>,
    pub resource_group_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoadBalancerRequest {
    pub name: String,
    pub is_public: bool,
    pub subnet_ids: Vec<String>,
    pub listeners: Vec<ListenerSpec>,
    pub pools: Vec<PoolRequest>,
    pub resource_group_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PoolRequest {
    pub name: String,
    pub algorithm: String,
    pub protocol: String,
    pub health_monitor: HealthMonitorSpec,
    pub members: Vec<PoolMember>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMember {
    pub address: String,
    pub port: u16,
}
