//! In-memory provider used by the engine tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vpcflow_cloud::{
    AttachedFloatingIp, CreateRequest, PollPolicy, ProviderClient, ProviderError, ProviderResult,
    RegionInfo, RemoteResource, ResourceKind, Scope, WaitSettings, attr,
};
use vpcflow_core::{TopologySpec, parse_topology_str};

pub const GEN1_TOPOLOGY: &str = r#"
region: us-south
generation: 1
resource_group: acme-rg
vpc: acme-vpc
classic_access: true
default_network_acl: acme-acl
network_acls:
  - name: acme-acl
security_groups:
  - name: acme-web-sg
    rules:
      - direction: inbound
        protocol: tcp
        port_min: 80
        port_max: 80
        remote_cidr: 0.0.0.0/0
      - direction: inbound
        protocol: tcp
        port_min: 22
        port_max: 22
        remote_security_group: acme-bastion-sg
  - name: acme-bastion-sg
ssh_keys:
  - name: acme-key
    public_key: ssh-rsa AAAAB3NzaC1yc2E acme
instance_templates:
  - name: web
    image: ubuntu-18.04-amd64
    profile: cc1-2x4
    ssh_key: acme-key
zones:
  - name: us-south-1
    address_prefix: 10.10.0.0/18
    subnets:
      - name: acme-subnet-1
        ipv4_cidr_block: 10.10.1.0/24
        network_acl: acme-acl
        public_gateway: true
        vpn:
          - name: acme-vpn
            connections:
              - name: acme-vpn-onprem
                peer_address: 203.0.113.10
                psk: secret
                local_cidrs: [10.10.1.0/24]
                peer_cidrs: [192.168.0.0/16]
        instances:
          - name: web-%d
            quantity: 2
            template: web
            security_group: acme-web-sg
            floating_ip: true
            lb_pools: [web-pool]
load_balancers:
  - name: acme-lb
    subnets: [acme-subnet-1]
    listeners:
      - port: 80
        default_pool: web-pool
    pools:
      - name: web-pool
"#;

pub const GEN2_TOPOLOGY: &str = r#"
region: us-south
generation: 2
vpc: demo-vpc
ssh_keys:
  - name: demo-key
    public_key: ssh-rsa AAAAB3NzaC1yc2E demo
instance_templates:
  - name: small
    image: ubuntu-18.04-amd64
    profile: bx2-2x8
    ssh_key: demo-key
zones:
  - name: us-south-1
    subnets:
      - name: demo-subnet
        ipv4_cidr_block: 10.240.0.0/24
        instances:
          - name: demo-vm
            template: small
"#;

pub fn topology(yaml: &str) -> TopologySpec {
    parse_topology_str(yaml, Path::new(".")).unwrap()
}

/// Zero-interval waits so tests never sleep
pub fn fast_waits() -> WaitSettings {
    WaitSettings::uniform(PollPolicy::bounded(Duration::ZERO, 20))
}

#[derive(Debug, Clone)]
struct Entry {
    resource: RemoteResource,
    parent: Option<String>,
    subnet: Option<String>,
    /// Remaining `get` calls before `target` is reached
    countdown: u32,
    target: Option<String>,
}

#[derive(Default)]
struct State {
    entries: Vec<Entry>,
    next_id: u32,
    events: Vec<String>,
    failures: HashMap<(&'static str, ResourceKind), u16>,
    stuck: HashSet<ResourceKind>,
    region_status: Option<String>,
    pending_polls: u32,
}

/// Provider double holding resources in memory
///
/// Mirrors the provider behaviors the engine depends on: asynchronous
/// transitions, refusal to delete running instances or non-empty subnets,
/// and protection of VPC default resources.
#[derive(Clone, Default)]
pub struct SimulatedCloud {
    state: Arc<Mutex<State>>,
}

impl SimulatedCloud {
    pub fn new() -> Self {
        let cloud = Self::default();
        cloud.seed(RemoteResource::new(
            ResourceKind::Image,
            "img-ubuntu",
            "ubuntu-18.04-amd64",
        ));
        cloud.seed(RemoteResource::new(
            ResourceKind::ResourceGroup,
            "rg-acme",
            "acme-rg",
        ));
        cloud
    }

    /// Number of `get` polls before asynchronous resources settle
    pub fn with_pending_polls(self, polls: u32) -> Self {
        self.state.lock().unwrap().pending_polls = polls;
        self
    }

    pub fn with_region_status(self, status: &str) -> Self {
        self.state.lock().unwrap().region_status = Some(status.to_string());
        self
    }

    /// Resources of `kind` never leave their initial status
    pub fn stuck(&self, kind: ResourceKind) {
        self.state.lock().unwrap().stuck.insert(kind);
    }

    /// Every `op` ("create", "delete", ...) on `kind` fails with `status`
    pub fn fail(&self, op: &'static str, kind: ResourceKind, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((op, kind), status);
    }

    pub fn seed(&self, resource: RemoteResource) {
        self.state.lock().unwrap().entries.push(Entry {
            resource,
            parent: None,
            subnet: None,
            countdown: 0,
            target: None,
        });
    }

    /// Remove a resource behind the engine's back
    pub fn remove_named(&self, kind: ResourceKind, name: &str) {
        self.state
            .lock()
            .unwrap()
            .entries
            .retain(|e| !(e.resource.kind == kind && e.resource.name == name));
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().unwrap().events.clear();
    }

    pub fn count_events(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn find(&self, kind: ResourceKind, name: &str) -> Option<RemoteResource> {
        self.state
            .lock()
            .unwrap()
            .entries
            .iter()
            .find(|e| e.resource.kind == kind && e.resource.name == name)
            .map(|e| e.resource.clone())
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.state
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|e| e.resource.kind == kind)
            .count()
    }
}

fn status_error(method: &str, kind: ResourceKind, status: u16, body: &str) -> ProviderError {
    ProviderError::Status {
        method: method.to_string(),
        url: format!("https://simulated.test/v1/{}", kind.label().replace(' ', "_")),
        status,
        body: body.to_string(),
    }
}

impl State {
    fn injected(&self, op: &'static str, kind: ResourceKind) -> ProviderResult<()> {
        match self.failures.get(&(op, kind)) {
            Some(status) => Err(status_error(
                &op.to_uppercase(),
                kind,
                *status,
                r#"{"errors":[{"code":"injected"}]}"#,
            )),
            None => Ok(()),
        }
    }

    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:04}", prefix, self.next_id)
    }

    fn name_of(&self, id: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|e| e.resource.id == id)
            .map(|e| e.resource.name.clone())
    }

    fn entry_mut(&mut self, kind: ResourceKind, id: &str) -> Option<&mut Entry> {
        self.entries
            .iter_mut()
            .find(|e| e.resource.kind == kind && e.resource.id == id)
    }

    fn insert(
        &mut self,
        resource: RemoteResource,
        parent: Option<String>,
        subnet: Option<String>,
        target: Option<&str>,
    ) -> RemoteResource {
        let kind = resource.kind;
        let stuck = self.stuck.contains(&kind);
        let mut entry = Entry {
            resource,
            parent,
            subnet,
            countdown: if stuck { u32::MAX } else { self.pending_polls },
            target: target.map(str::to_string),
        };
        if entry.countdown == 0 {
            if let Some(target) = entry.target.take() {
                entry.resource.status = Some(target);
            }
        }
        let stored = entry.resource.clone();
        self.entries.push(entry);
        self.events.push(format!("create:{}:{}", kind, stored.name));
        stored
    }
}

#[async_trait]
impl ProviderClient for SimulatedCloud {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn region(&self, name: &str) -> ProviderResult<RegionInfo> {
        let state = self.state.lock().unwrap();
        Ok(RegionInfo {
            name: name.to_string(),
            status: state
                .region_status
                .clone()
                .unwrap_or_else(|| "available".to_string()),
            endpoint: Some("https://simulated.test".to_string()),
        })
    }

    async fn list(&self, kind: ResourceKind, scope: &Scope) -> ProviderResult<Vec<RemoteResource>> {
        let state = self.state.lock().unwrap();
        state.injected("list", kind)?;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.resource.kind == kind)
            .filter(|e| scope.parent_id.is_none() || e.parent == scope.parent_id)
            .filter(|e| scope.subnet.is_none() || e.subnet == scope.subnet)
            .map(|e| e.resource.clone())
            .collect())
    }

    async fn get(&self, kind: ResourceKind, id: &str, _scope: &Scope) -> ProviderResult<RemoteResource> {
        let mut state = self.state.lock().unwrap();
        state.injected("get", kind)?;
        let entry = state
            .entry_mut(kind, id)
            .ok_or_else(|| status_error("GET", kind, 404, r#"{"errors":[{"code":"not_found"}]}"#))?;
        if entry.countdown > 0 && entry.countdown != u32::MAX {
            entry.countdown -= 1;
        }
        if entry.countdown == 0 {
            if let Some(target) = entry.target.take() {
                entry.resource.status = Some(target);
            }
        }
        Ok(entry.resource.clone())
    }

    async fn create(&self, request: &CreateRequest) -> ProviderResult<RemoteResource> {
        let mut state = self.state.lock().unwrap();
        let kind = request.kind();
        state.injected("create", kind)?;

        let created = match request {
            CreateRequest::NetworkAcl { name, .. } => {
                let id = state.id("acl");
                let acl = RemoteResource::new(kind, id, name).with_status("available");
                state.insert(acl, None, None, None)
            }
            CreateRequest::Vpc {
                name,
                default_network_acl_id,
                ..
            } => {
                let id = state.id("vpc");
                let sg_id = state.id("sg");
                let acl_id = default_network_acl_id.clone().unwrap_or_else(|| state.id("acl"));
                state.entries.push(Entry {
                    resource: RemoteResource::new(
                        ResourceKind::SecurityGroup,
                        &sg_id,
                        format!("{}-default", id),
                    )
                    .with_vpc(&id),
                    parent: None,
                    subnet: None,
                    countdown: 0,
                    target: None,
                });
                let vpc = RemoteResource::new(kind, &id, name)
                    .with_status("available")
                    .with_attribute(attr::DEFAULT_SECURITY_GROUP, json!(sg_id))
                    .with_attribute(attr::DEFAULT_NETWORK_ACL, json!(acl_id));
                state.insert(vpc, None, None, None)
            }
            CreateRequest::SecurityGroup { name, vpc_id, .. } => {
                let id = state.id("sg");
                let group = RemoteResource::new(kind, id, name).with_vpc(vpc_id);
                state.insert(group, None, None, None)
            }
            CreateRequest::SecurityGroupRule { group_id, rule } => {
                let id = state.id("rule");
                let resource = RemoteResource::new(kind, id, rule.signature());
                state.insert(resource, Some(group_id.clone()), None, None)
            }
            CreateRequest::SshKey { name, .. } => {
                let id = state.id("key");
                state.insert(RemoteResource::new(kind, id, name), None, None, None)
            }
            CreateRequest::AddressPrefix {
                vpc_id, name, zone, ..
            } => {
                let id = state.id("prefix");
                let prefix = RemoteResource::new(kind, id, name).with_zone(zone);
                state.insert(prefix, Some(vpc_id.clone()), None, None)
            }
            CreateRequest::Subnet {
                name, vpc_id, zone, ..
            } => {
                let id = state.id("subnet");
                let subnet = RemoteResource::new(kind, id, name)
                    .with_status("pending")
                    .with_vpc(vpc_id)
                    .with_zone(zone);
                state.insert(subnet, None, None, Some("available"))
            }
            CreateRequest::PublicGateway {
                name, vpc_id, zone, ..
            } => {
                let id = state.id("gw");
                let gateway = RemoteResource::new(kind, id, name)
                    .with_status("available")
                    .with_vpc(vpc_id)
                    .with_zone(zone);
                state.insert(gateway, None, None, None)
            }
            CreateRequest::VpnGateway {
                name, subnet_id, ..
            } => {
                let id = state.id("vpn");
                let subnet = state.name_of(subnet_id);
                let gateway = RemoteResource::new(kind, id, name).with_status("pending");
                state.insert(gateway, None, subnet, Some("available"))
            }
            CreateRequest::VpnConnection {
                gateway_id, name, ..
            } => {
                let id = state.id("conn");
                let connection = RemoteResource::new(kind, id, name).with_status("down");
                state.insert(connection, Some(gateway_id.clone()), None, None)
            }
            CreateRequest::Instance(instance) => {
                let id = state.id("instance");
                let nic = state.id("nic");
                let subnet = state.name_of(&instance.subnet_id);
                let address = format!("10.10.1.{}", state.next_id);
                let resource = RemoteResource::new(kind, &id, &instance.name)
                    .with_status("pending")
                    .with_vpc(&instance.vpc_id)
                    .with_zone(&instance.zone)
                    .with_attribute(attr::PRIMARY_INTERFACE, json!(nic))
                    .with_attribute(attr::PRIMARY_IPV4, json!(address));
                state.insert(resource, None, subnet, Some("running"))
            }
            CreateRequest::FloatingIp {
                name,
                target_interface_id,
                ..
            } => {
                let id = state.id("fip");
                let fip = RemoteResource::new(kind, id, name)
                    .with_status("available")
                    .with_attribute(attr::TARGET, json!(target_interface_id))
                    .with_attribute(attr::ADDRESS, json!("198.51.100.7"));
                state.insert(fip, None, None, None)
            }
            CreateRequest::LoadBalancer(lb) => {
                let id = state.id("lb");
                let members: usize = lb.pools.iter().map(|p| p.members.len()).sum();
                let resource = RemoteResource::new(kind, id, &lb.name)
                    .with_status("create_pending")
                    .with_attribute("members", json!(members));
                state.insert(resource, None, None, None)
            }
            CreateRequest::Route {
                vpc_id,
                name,
                zone,
                destination,
                next_hop,
            } => {
                let id = state.id("route");
                let route = RemoteResource::new(kind, id, name)
                    .with_zone(zone)
                    .with_attribute(attr::DESTINATION, json!(destination))
                    .with_attribute(attr::NEXT_HOP, json!(next_hop));
                state.insert(route, Some(vpc_id.clone()), None, None)
            }
        };
        Ok(created)
    }

    async fn delete(&self, kind: ResourceKind, id: &str, _scope: &Scope) -> ProviderResult<()> {
        let mut state = self.state.lock().unwrap();
        state.injected("delete", kind)?;
        let Some(index) = state
            .entries
            .iter()
            .position(|e| e.resource.kind == kind && e.resource.id == id)
        else {
            return Err(status_error("DELETE", kind, 404, r#"{"errors":[{"code":"not_found"}]}"#));
        };

        let entry = state.entries[index].clone();
        let in_use = |reason: &str| Err(status_error("DELETE", kind, 409, reason));
        match kind {
            ResourceKind::Instance if !entry.resource.has_status("stopped") => {
                return in_use("instance is running");
            }
            ResourceKind::Subnet => {
                let name = Some(entry.resource.name.clone());
                let occupied = state.entries.iter().any(|e| {
                    matches!(e.resource.kind, ResourceKind::Instance | ResourceKind::VpnGateway)
                        && e.subnet == name
                });
                if occupied || entry.resource.public_gateway_id().is_some() {
                    return in_use("subnet in use");
                }
            }
            ResourceKind::PublicGateway => {
                let attached = state.entries.iter().any(|e| {
                    e.resource.kind == ResourceKind::Subnet
                        && e.resource.public_gateway_id().as_deref() == Some(id)
                });
                if attached {
                    return in_use("gateway attached");
                }
            }
            ResourceKind::SecurityGroup => {
                let default = state.entries.iter().any(|e| {
                    e.resource.kind == ResourceKind::Vpc
                        && e.resource.default_security_group_id().as_deref() == Some(id)
                });
                if default {
                    return in_use("default security group");
                }
            }
            ResourceKind::Vpc => {
                let occupied = state.entries.iter().any(|e| {
                    e.resource.kind == ResourceKind::Subnet
                        && e.resource.vpc_id.as_deref() == Some(id)
                });
                if occupied {
                    return in_use("vpc has subnets");
                }
            }
            _ => {}
        }

        state.entries.remove(index);
        if kind == ResourceKind::Vpc {
            let vpc = Some(id.to_string());
            state.entries.retain(|e| {
                !(e.resource.kind == ResourceKind::SecurityGroup && e.resource.vpc_id == vpc)
            });
        }
        state
            .events
            .push(format!("delete:{}:{}", kind, entry.resource.name));
        Ok(())
    }

    async fn attach_public_gateway(
        &self,
        subnet_id: &str,
        gateway_id: &str,
    ) -> ProviderResult<RemoteResource> {
        let mut state = self.state.lock().unwrap();
        state.injected("attach", ResourceKind::PublicGateway)?;
        let gateway = state
            .entries
            .iter()
            .find(|e| e.resource.id == gateway_id)
            .map(|e| e.resource.clone())
            .ok_or_else(|| status_error("PUT", ResourceKind::PublicGateway, 404, "{}"))?;
        let subnet = state
            .entry_mut(ResourceKind::Subnet, subnet_id)
            .ok_or_else(|| status_error("PUT", ResourceKind::Subnet, 404, "{}"))?;
        subnet
            .resource
            .set_attribute(attr::PUBLIC_GATEWAY, json!(gateway_id));
        let name = subnet.resource.name.clone();
        state.events.push(format!("attach:{}", name));
        Ok(gateway)
    }

    async fn detach_public_gateway(&self, subnet_id: &str) -> ProviderResult<()> {
        let mut state = self.state.lock().unwrap();
        let subnet = state
            .entry_mut(ResourceKind::Subnet, subnet_id)
            .ok_or_else(|| status_error("DELETE", ResourceKind::Subnet, 404, "{}"))?;
        subnet.resource.remove_attribute(attr::PUBLIC_GATEWAY);
        let name = subnet.resource.name.clone();
        state.events.push(format!("detach:{}", name));
        Ok(())
    }

    async fn stop_instance(&self, instance_id: &str) -> ProviderResult<()> {
        let mut state = self.state.lock().unwrap();
        let pending = state.pending_polls;
        let instance = state
            .entry_mut(ResourceKind::Instance, instance_id)
            .ok_or_else(|| status_error("POST", ResourceKind::Instance, 404, "{}"))?;
        instance.resource.status = Some("stopping".to_string());
        instance.target = Some("stopped".to_string());
        instance.countdown = pending;
        let name = instance.resource.name.clone();
        state.events.push(format!("stop:{}", name));
        Ok(())
    }

    async fn instance_floating_ips(&self, instance_id: &str) -> ProviderResult<Vec<AttachedFloatingIp>> {
        let state = self.state.lock().unwrap();
        let instance = state
            .entries
            .iter()
            .find(|e| e.resource.id == instance_id)
            .map(|e| e.resource.clone())
            .ok_or_else(|| status_error("GET", ResourceKind::Instance, 404, "{}"))?;
        let nic = instance.primary_interface_id();
        Ok(state
            .entries
            .iter()
            .filter(|e| e.resource.kind == ResourceKind::FloatingIp)
            .filter(|e| nic.is_some() && e.resource.target_id() == nic)
            .map(|e| AttachedFloatingIp {
                instance_id: instance_id.to_string(),
                interface_id: nic.clone().unwrap_or_default(),
                floating_ip: e.resource.clone(),
            })
            .collect())
    }

    async fn detach_floating_ip(&self, attached: &AttachedFloatingIp) -> ProviderResult<()> {
        let mut state = self.state.lock().unwrap();
        let fip = state
            .entry_mut(ResourceKind::FloatingIp, &attached.floating_ip.id)
            .ok_or_else(|| status_error("DELETE", ResourceKind::FloatingIp, 404, "{}"))?;
        fip.resource.remove_attribute(attr::TARGET);
        let name = fip.resource.name.clone();
        state.events.push(format!("release:{}", name));
        Ok(())
    }
}
