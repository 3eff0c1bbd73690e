//! Remote resource handles
//!
//! A `RemoteResource` is what the provider reports for a resource right now.
//! It is discovered by name whenever it is needed and never persisted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Well-known attribute keys
pub mod attr {
    pub const PRIMARY_IPV4: &str = "primary_ipv4";
    pub const PRIMARY_INTERFACE: &str = "primary_interface";
    pub const PUBLIC_GATEWAY: &str = "public_gateway";
    pub const DEFAULT_NETWORK_ACL: &str = "default_network_acl";
    pub const DEFAULT_SECURITY_GROUP: &str = "default_security_group";
    pub const TARGET: &str = "target";
    pub const ADDRESS: &str = "address";
    pub const DESTINATION: &str = "destination";
    pub const NEXT_HOP: &str = "next_hop";
}

/// Kind of provider resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Region,
    ResourceGroup,
    Image,
    NetworkAcl,
    Vpc,
    SecurityGroup,
    SecurityGroupRule,
    SshKey,
    AddressPrefix,
    Subnet,
    PublicGateway,
    VpnGateway,
    VpnConnection,
    Instance,
    FloatingIp,
    LoadBalancer,
    Route,
}

impl ResourceKind {
    /// Human-readable label used in progress messages
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Region => "region",
            ResourceKind::ResourceGroup => "resource group",
            ResourceKind::Image => "image",
            ResourceKind::NetworkAcl => "network acl",
            ResourceKind::Vpc => "vpc",
            ResourceKind::SecurityGroup => "security group",
            ResourceKind::SecurityGroupRule => "security group rule",
            ResourceKind::SshKey => "ssh key",
            ResourceKind::AddressPrefix => "address prefix",
            ResourceKind::Subnet => "subnet",
            ResourceKind::PublicGateway => "public gateway",
            ResourceKind::VpnGateway => "vpn gateway",
            ResourceKind::VpnConnection => "vpn connection",
            ResourceKind::Instance => "instance",
            ResourceKind::FloatingIp => "floating ip",
            ResourceKind::LoadBalancer => "load balancer",
            ResourceKind::Route => "route",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a lookup happens
///
/// `parent_id` selects a nested collection (address prefixes and routes of
/// a VPC, connections of a VPN gateway, rules of a security group).
/// `vpc_id` and `subnet` narrow a top-level collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub parent_id: Option<String>,
    pub vpc_id: Option<String>,
    pub subnet: Option<String>,
}

impl Scope {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn vpc(vpc_id: impl Into<String>) -> Self {
        Self {
            vpc_id: Some(vpc_id.into()),
            ..Self::default()
        }
    }

    pub fn parent(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            ..Self::default()
        }
    }

    pub fn with_subnet(mut self, subnet: impl Into<String>) -> Self {
        self.subnet = Some(subnet.into());
        self
    }
}

/// Provider-side state of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResource {
    pub kind: ResourceKind,

    /// Provider-assigned identifier
    pub id: String,

    pub name: String,

    /// Lifecycle status (pending, available, running, stopped, ...)
    pub status: Option<String>,

    pub vpc_id: Option<String>,

    pub zone: Option<String>,

    /// Kind-specific attributes, see [`attr`]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl RemoteResource {
    pub fn new(kind: ResourceKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: name.into(),
            status: None,
            vpc_id: None,
            zone: None,
            attributes: HashMap::new(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_vpc(mut self, vpc_id: impl Into<String>) -> Self {
        self.vpc_id = Some(vpc_id.into());
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<serde_json::Value> {
        self.attributes.remove(key)
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn has_status(&self, status: &str) -> bool {
        self.status.as_deref() == Some(status)
    }

    pub fn primary_ipv4(&self) -> Option<String> {
        self.get_attribute(attr::PRIMARY_IPV4)
    }

    pub fn primary_interface_id(&self) -> Option<String> {
        self.get_attribute(attr::PRIMARY_INTERFACE)
    }

    /// Id of the public gateway attached to a subnet
    pub fn public_gateway_id(&self) -> Option<String> {
        self.get_attribute(attr::PUBLIC_GATEWAY)
    }

    pub fn default_network_acl_id(&self) -> Option<String> {
        self.get_attribute(attr::DEFAULT_NETWORK_ACL)
    }

    pub fn default_security_group_id(&self) -> Option<String> {
        self.get_attribute(attr::DEFAULT_SECURITY_GROUP)
    }

    /// Interface a floating IP is bound to
    pub fn target_id(&self) -> Option<String> {
        self.get_attribute(attr::TARGET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attributes() {
        let subnet = RemoteResource::new(ResourceKind::Subnet, "sub-1", "acme-subnet-1")
            .with_status("available")
            .with_zone("us-south-1")
            .with_attribute(attr::PUBLIC_GATEWAY, json!("gw-1"));

        assert!(subnet.has_status("available"));
        assert_eq!(subnet.public_gateway_id().as_deref(), Some("gw-1"));
        assert!(subnet.primary_ipv4().is_none());
    }

    #[test]
    fn test_scope_builders() {
        let scope = Scope::vpc("vpc-1").with_subnet("s1");
        assert_eq!(scope.vpc_id.as_deref(), Some("vpc-1"));
        assert_eq!(scope.subnet.as_deref(), Some("s1"));
        assert!(scope.parent_id.is_none());
        assert_eq!(Scope::global(), Scope::default());
    }
}
