//! JSON wire format of the VPC API
//!
//! Collection paths, create bodies per dialect, and decoding of provider
//! documents into [`RemoteResource`].

use serde_json::{Map, Value, json};
use vpcflow_cloud::{
    ApiDialect, CreateRequest, InstanceRequest, LoadBalancerRequest, ProviderError, RemoteResource,
    ResourceKind, RuleRemote, Scope, SecurityGroupRuleRequest, attr, rule_signature,
};

/// Which service a collection lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Iaas,
    ResourceController,
}

/// Collection path of `kind` (without query), and the service hosting it
pub fn collection_path(kind: ResourceKind, scope: &Scope) -> Result<(Service, String), ProviderError> {
    let parent = || {
        scope
            .parent_id
            .as_deref()
            .ok_or(ProviderError::MissingParent { kind })
    };

    let path = match kind {
        ResourceKind::ResourceGroup => {
            return Ok((Service::ResourceController, "/v2/resource_groups".to_string()));
        }
        ResourceKind::Region => "/v1/regions".to_string(),
        ResourceKind::Image => "/v1/images".to_string(),
        ResourceKind::NetworkAcl => "/v1/network_acls".to_string(),
        ResourceKind::Vpc => "/v1/vpcs".to_string(),
        ResourceKind::SecurityGroup => "/v1/security_groups".to_string(),
        ResourceKind::SecurityGroupRule => format!("/v1/security_groups/{}/rules", parent()?),
        ResourceKind::SshKey => "/v1/keys".to_string(),
        ResourceKind::AddressPrefix => format!("/v1/vpcs/{}/address_prefixes", parent()?),
        ResourceKind::Subnet => "/v1/subnets".to_string(),
        ResourceKind::PublicGateway => "/v1/public_gateways".to_string(),
        ResourceKind::VpnGateway => "/v1/vpn_gateways".to_string(),
        ResourceKind::VpnConnection => format!("/v1/vpn_gateways/{}/connections", parent()?),
        ResourceKind::Instance => "/v1/instances".to_string(),
        ResourceKind::FloatingIp => "/v1/floating_ips".to_string(),
        ResourceKind::LoadBalancer => "/v1/load_balancers".to_string(),
        ResourceKind::Route => format!("/v1/vpcs/{}/routes", parent()?),
    };
    Ok((Service::Iaas, path))
}

/// Server-side filters for a scoped listing
pub fn list_filters(kind: ResourceKind, scope: &Scope) -> Vec<(String, String)> {
    let mut filters = Vec::new();
    if let Some(vpc_id) = &scope.vpc_id {
        if matches!(
            kind,
            ResourceKind::SecurityGroup | ResourceKind::Subnet | ResourceKind::Instance
        ) {
            filters.push(("vpc.id".to_string(), vpc_id.clone()));
        }
    }
    if let Some(subnet) = &scope.subnet {
        if kind == ResourceKind::Instance {
            filters.push(("network_interfaces.subnet.name".to_string(), subnet.clone()));
        }
    }
    filters
}

/// Key of the array holding a collection page
pub fn collection_key(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Region => "regions",
        ResourceKind::ResourceGroup => "resources",
        ResourceKind::Image => "images",
        ResourceKind::NetworkAcl => "network_acls",
        ResourceKind::Vpc => "vpcs",
        ResourceKind::SecurityGroup => "security_groups",
        ResourceKind::SecurityGroupRule => "rules",
        ResourceKind::SshKey => "keys",
        ResourceKind::AddressPrefix => "address_prefixes",
        ResourceKind::Subnet => "subnets",
        ResourceKind::PublicGateway => "public_gateways",
        ResourceKind::VpnGateway => "vpn_gateways",
        ResourceKind::VpnConnection => "connections",
        ResourceKind::Instance => "instances",
        ResourceKind::FloatingIp => "floating_ips",
        ResourceKind::LoadBalancer => "load_balancers",
        ResourceKind::Route => "routes",
    }
}

/// URL of the next page, if the provider reported one
pub fn next_page(page: &Value) -> Option<String> {
    page.pointer("/next/href")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn text(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).map(str::to_string)
}

/// Decode one provider document of `kind`
pub fn decode(kind: ResourceKind, value: &Value) -> Result<RemoteResource, String> {
    let id = text(value, "/id").ok_or_else(|| format!("{} without an id", kind))?;
    let name = match kind {
        ResourceKind::SecurityGroupRule => rule_name(value),
        _ => text(value, "/name").ok_or_else(|| format!("{} '{}' without a name", kind, id))?,
    };

    let mut resource = RemoteResource::new(kind, id, name);
    if let Some(status) = text(value, "/status")
        .or_else(|| text(value, "/state"))
        .or_else(|| text(value, "/lifecycle_state"))
        .or_else(|| text(value, "/provisioning_status"))
    {
        resource = resource.with_status(status);
    }
    if let Some(vpc_id) = text(value, "/vpc/id") {
        resource = resource.with_vpc(vpc_id);
    }
    if let Some(zone) = text(value, "/zone/name").or_else(|| text(value, "/zone")) {
        resource = resource.with_zone(zone);
    }

    let copies: &[(&str, &str)] = match kind {
        ResourceKind::Vpc => &[
            (attr::DEFAULT_NETWORK_ACL, "/default_network_acl/id"),
            (attr::DEFAULT_SECURITY_GROUP, "/default_security_group/id"),
        ],
        ResourceKind::Subnet => &[(attr::PUBLIC_GATEWAY, "/public_gateway/id")],
        ResourceKind::Instance => &[
            (attr::PRIMARY_INTERFACE, "/primary_network_interface/id"),
            (attr::PRIMARY_IPV4, "/primary_network_interface/primary_ipv4_address"),
        ],
        ResourceKind::FloatingIp => &[(attr::TARGET, "/target/id"), (attr::ADDRESS, "/address")],
        ResourceKind::Route => &[
            (attr::DESTINATION, "/destination"),
            (attr::NEXT_HOP, "/next_hop/address"),
        ],
        _ => &[],
    };
    for (key, pointer) in copies {
        if let Some(found) = text(value, pointer) {
            resource.set_attribute(*key, Value::String(found));
        }
    }
    Ok(resource)
}

/// Rules carry no name, so they are identified by their signature
fn rule_name(value: &Value) -> String {
    let remote = if let Some(id) = text(value, "/remote/id") {
        RuleRemote::SecurityGroup(id)
    } else if let Some(cidr) = text(value, "/remote/cidr_block") {
        RuleRemote::Cidr(cidr)
    } else if let Some(address) = text(value, "/remote/address") {
        RuleRemote::Address(address)
    } else {
        RuleRemote::Any
    };
    let port = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|p| u16::try_from(p).ok())
    };
    rule_signature(
        &text(value, "/direction").unwrap_or_default(),
        &text(value, "/protocol").unwrap_or_else(|| "all".to_string()),
        port("port_min"),
        port("port_max"),
        &remote,
    )
}

fn reference(id: &str) -> Value {
    json!({ "id": id })
}

fn insert_group(body: &mut Map<String, Value>, resource_group_id: &Option<String>) {
    if let Some(id) = resource_group_id {
        body.insert("resource_group".to_string(), reference(id));
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn rule_body(rule: &SecurityGroupRuleRequest) -> Value {
    let mut body = object(json!({
        "direction": rule.direction,
        "ip_version": rule.ip_version,
        "protocol": rule.protocol,
    }));
    if let Some(min) = rule.port_min {
        body.insert("port_min".to_string(), json!(min));
    }
    if let Some(max) = rule.port_max {
        body.insert("port_max".to_string(), json!(max));
    }
    let remote = match &rule.remote {
        RuleRemote::Any => None,
        RuleRemote::Cidr(cidr) => Some(json!({ "cidr_block": cidr })),
        RuleRemote::Address(address) => Some(json!({ "address": address })),
        RuleRemote::SecurityGroup(id) => Some(reference(id)),
    };
    if let Some(remote) = remote {
        body.insert("remote".to_string(), remote);
    }
    Value::Object(body)
}

fn instance_body(instance: &InstanceRequest, dialect: ApiDialect) -> Value {
    let mut interface = object(json!({
        "subnet": reference(&instance.subnet_id),
        "security_groups": instance.security_group_ids.iter().map(|id| reference(id)).collect::<Vec<_>>(),
    }));
    if dialect == ApiDialect::Gen1 {
        if let Some(speed) = instance.bandwidth {
            interface.insert("port_speed".to_string(), json!(speed));
        }
    }

    let mut body = object(json!({
        "name": instance.name,
        "zone": { "name": instance.zone },
        "vpc": reference(&instance.vpc_id),
        "image": reference(&instance.image_id),
        "profile": { "name": instance.profile },
        "keys": [reference(&instance.key_id)],
        "primary_network_interface": interface,
    }));
    if let Some(user_data) = &instance.user_data {
        body.insert("user_data".to_string(), json!(user_data));
    }
    if !instance.volumes.is_empty() {
        let attachments: Vec<Value> = instance
            .volumes
            .iter()
            .map(|volume| {
                json!({
                    "delete_volume_on_instance_delete": true,
                    "volume": {
                        "name": volume.name,
                        "capacity": volume.capacity,
                        "profile": { "name": volume.profile },
                    },
                })
            })
            .collect();
        body.insert("volume_attachments".to_string(), Value::Array(attachments));
    }
    insert_group(&mut body, &instance.resource_group_id);
    Value::Object(body)
}

fn load_balancer_body(lb: &LoadBalancerRequest) -> Value {
    let listeners: Vec<Value> = lb
        .listeners
        .iter()
        .map(|listener| {
            let mut body = object(json!({
                "port": listener.port,
                "protocol": listener.protocol,
            }));
            if let Some(limit) = listener.connection_limit {
                body.insert("connection_limit".to_string(), json!(limit));
            }
            if let Some(pool) = &listener.default_pool {
                body.insert("default_pool".to_string(), json!({ "name": pool }));
            }
            Value::Object(body)
        })
        .collect();

    let pools: Vec<Value> = lb
        .pools
        .iter()
        .map(|pool| {
            let monitor = &pool.health_monitor;
            let mut health = object(json!({
                "delay": monitor.delay,
                "max_retries": monitor.max_retries,
                "timeout": monitor.timeout,
                "type": monitor.kind,
            }));
            if let Some(url_path) = &monitor.url_path {
                health.insert("url_path".to_string(), json!(url_path));
            }
            json!({
                "name": pool.name,
                "algorithm": pool.algorithm,
                "protocol": pool.protocol,
                "health_monitor": health,
                "members": pool.members.iter().map(|m| json!({
                    "port": m.port,
                    "target": { "address": m.address },
                })).collect::<Vec<_>>(),
            })
        })
        .collect();

    let mut body = object(json!({
        "name": lb.name,
        "is_public": lb.is_public,
        "subnets": lb.subnet_ids.iter().map(|id| reference(id)).collect::<Vec<_>>(),
        "listeners": listeners,
        "pools": pools,
    }));
    insert_group(&mut body, &lb.resource_group_id);
    Value::Object(body)
}

/// Path and JSON body of a create call
pub fn create_body(request: &CreateRequest, dialect: ApiDialect) -> Result<(String, Value), ProviderError> {
    let kind = request.kind();
    if !dialect.supports(kind) {
        return Err(ProviderError::Unsupported {
            kind,
            dialect: dialect.to_string(),
        });
    }

    let (path, body) = match request {
        CreateRequest::NetworkAcl {
            name,
            rules,
            resource_group_id,
        } => {
            let rules: Vec<Value> = rules
                .iter()
                .map(|rule| {
                    let mut body = object(json!({
                        "name": rule.name,
                        "action": rule.action,
                        "direction": rule.direction,
                        "source": rule.source,
                        "destination": rule.destination,
                        "protocol": rule.protocol,
                    }));
                    if let Some(min) = rule.port_min {
                        body.insert("destination_port_min".to_string(), json!(min));
                    }
                    if let Some(max) = rule.port_max {
                        body.insert("destination_port_max".to_string(), json!(max));
                    }
                    Value::Object(body)
                })
                .collect();
            let mut body = object(json!({ "name": name, "rules": rules }));
            insert_group(&mut body, resource_group_id);
            ("/v1/network_acls".to_string(), body)
        }
        CreateRequest::Vpc {
            name,
            classic_access,
            default_network_acl_id,
            resource_group_id,
        } => {
            let mut body = object(json!({ "name": name }));
            if dialect.supports_classic_access() {
                body.insert("classic_access".to_string(), json!(classic_access));
            }
            if let Some(acl) = default_network_acl_id {
                body.insert("default_network_acl".to_string(), reference(acl));
            }
            insert_group(&mut body, resource_group_id);
            ("/v1/vpcs".to_string(), body)
        }
        CreateRequest::SecurityGroup {
            name,
            vpc_id,
            rules,
            resource_group_id,
        } => {
            let mut body = object(json!({
                "name": name,
                "vpc": reference(vpc_id),
                "rules": rules.iter().map(rule_body).collect::<Vec<_>>(),
            }));
            insert_group(&mut body, resource_group_id);
            ("/v1/security_groups".to_string(), body)
        }
        CreateRequest::SecurityGroupRule { group_id, rule } => (
            format!("/v1/security_groups/{}/rules", group_id),
            object(rule_body(rule)),
        ),
        CreateRequest::SshKey {
            name,
            public_key,
            key_type,
            resource_group_id,
        } => {
            let mut body = object(json!({
                "name": name,
                "public_key": public_key,
                "type": key_type,
            }));
            insert_group(&mut body, resource_group_id);
            ("/v1/keys".to_string(), body)
        }
        CreateRequest::AddressPrefix {
            vpc_id,
            name,
            zone,
            cidr,
        } => (
            format!("/v1/vpcs/{}/address_prefixes", vpc_id),
            object(json!({ "name": name, "zone": { "name": zone }, "cidr": cidr })),
        ),
        CreateRequest::Subnet {
            name,
            vpc_id,
            zone,
            ipv4_cidr_block,
            network_acl_id,
            resource_group_id,
        } => {
            let mut body = object(json!({
                "name": name,
                "ipv4_cidr_block": ipv4_cidr_block,
                "zone": { "name": zone },
                "vpc": reference(vpc_id),
            }));
            if let Some(acl) = network_acl_id {
                body.insert("network_acl".to_string(), reference(acl));
            }
            insert_group(&mut body, resource_group_id);
            ("/v1/subnets".to_string(), body)
        }
        CreateRequest::PublicGateway {
            name,
            vpc_id,
            zone,
            resource_group_id,
        } => {
            let mut body = object(json!({
                "name": name,
                "zone": { "name": zone },
                "vpc": reference(vpc_id),
            }));
            insert_group(&mut body, resource_group_id);
            ("/v1/public_gateways".to_string(), body)
        }
        CreateRequest::VpnGateway {
            name,
            subnet_id,
            resource_group_id,
        } => {
            let mut body = object(json!({ "name": name, "subnet": reference(subnet_id) }));
            insert_group(&mut body, resource_group_id);
            ("/v1/vpn_gateways".to_string(), body)
        }
        CreateRequest::VpnConnection {
            gateway_id,
            name,
            peer_address,
            psk,
            local_cidrs,
            peer_cidrs,
        } => (
            format!("/v1/vpn_gateways/{}/connections", gateway_id),
            object(json!({
                "name": name,
                "peer_address": peer_address,
                "psk": psk,
                "local_cidrs": local_cidrs,
                "peer_cidrs": peer_cidrs,
            })),
        ),
        CreateRequest::Instance(instance) => {
            ("/v1/instances".to_string(), object(instance_body(instance, dialect)))
        }
        CreateRequest::FloatingIp {
            name,
            target_interface_id,
            resource_group_id,
        } => {
            let mut body = object(json!({
                "name": name,
                "target": reference(target_interface_id),
            }));
            insert_group(&mut body, resource_group_id);
            ("/v1/floating_ips".to_string(), body)
        }
        CreateRequest::LoadBalancer(lb) => {
            ("/v1/load_balancers".to_string(), object(load_balancer_body(lb)))
        }
        CreateRequest::Route {
            vpc_id,
            name,
            zone,
            destination,
            next_hop,
        } => (
            format!("/v1/vpcs/{}/routes", vpc_id),
            object(json!({
                "name": name,
                "zone": { "name": zone },
                "destination": destination,
                "next_hop": { "address": next_hop },
            })),
        ),
    };
    Ok((path, Value::Object(body)))
}
