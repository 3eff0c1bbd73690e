//! Reconciliation planner
//!
//! Turns a topology into an ordered list of operations. Planning is pure:
//! it never talks to the provider, so `vpcflow plan` can print exactly what
//! a run would attempt.

use crate::action::{MemberRef, Mode, Plan, ResourceOperation, Step};
use crate::dialect::ApiDialect;
use crate::resource::ResourceKind;
use tracing::{debug, warn};
use vpcflow_core::{
    SecurityGroupRule, Subnet, TopologySpec, Zone, address_prefix_name, expand_instance_names,
    floating_ip_name, public_gateway_name,
};

pub fn plan(topology: &TopologySpec, dialect: ApiDialect, mode: Mode) -> Plan {
    let operations = match mode {
        Mode::Create => plan_create(topology, dialect),
        Mode::Destroy => plan_destroy(topology, dialect),
    };
    debug!(mode = %mode, operations = operations.len(), "Plan built");
    Plan::new(mode, operations)
}

fn plan_create(topology: &TopologySpec, dialect: ApiDialect) -> Vec<ResourceOperation> {
    let mut ops = vec![ResourceOperation::new(
        ResourceKind::Region,
        &topology.region,
        Step::CheckRegion,
    )];

    if let Some(group) = &topology.resource_group {
        ops.push(ResourceOperation::new(
            ResourceKind::ResourceGroup,
            group,
            Step::LookupResourceGroup,
        ));
    }

    if dialect.supports(ResourceKind::NetworkAcl) {
        for acl in &topology.network_acls {
            ops.push(ResourceOperation::new(
                ResourceKind::NetworkAcl,
                &acl.name,
                Step::CreateNetworkAcl {
                    rules: acl.rules.clone(),
                },
            ));
        }
    } else if !topology.network_acls.is_empty() {
        warn!(dialect = %dialect, "Network ACLs are not managed for this generation");
    }

    ops.push(ResourceOperation::new(
        ResourceKind::Vpc,
        &topology.vpc,
        Step::CreateVpc {
            classic_access: dialect.supports_classic_access() && topology.classic_access,
            default_network_acl: if dialect.requires_default_network_acl() {
                topology.default_network_acl.clone()
            } else {
                None
            },
        },
    ));

    // Group-referencing rules wait until every group exists
    let mut deferred = Vec::new();
    for group in &topology.security_groups {
        let (referencing, plain): (Vec<SecurityGroupRule>, Vec<SecurityGroupRule>) = group
            .rules
            .iter()
            .cloned()
            .partition(|rule| rule.remote_security_group.is_some());
        ops.push(ResourceOperation::new(
            ResourceKind::SecurityGroup,
            &group.name,
            Step::CreateSecurityGroup { rules: plain },
        ));
        if !referencing.is_empty() {
            deferred.push(ResourceOperation::new(
                ResourceKind::SecurityGroup,
                &group.name,
                Step::AddSecurityGroupRules { rules: referencing },
            ));
        }
    }
    ops.extend(deferred);

    for key in &topology.ssh_keys {
        ops.push(ResourceOperation::new(
            ResourceKind::SshKey,
            &key.name,
            Step::CreateSshKey {
                public_key: key.public_key.clone(),
                key_type: key.key_type.clone(),
            },
        ));
    }

    for zone in &topology.zones {
        plan_zone_create(topology, dialect, zone, &mut ops);
    }

    if dialect.supports(ResourceKind::LoadBalancer) {
        for lb in &topology.load_balancers {
            ops.push(ResourceOperation::new(
                ResourceKind::LoadBalancer,
                &lb.name,
                Step::CreateLoadBalancer {
                    spec: lb.clone(),
                    members: pool_members(topology, &lb.pools),
                },
            ));
        }
    } else if !topology.load_balancers.is_empty() {
        warn!(dialect = %dialect, "Load balancers are not managed for this generation");
    }

    ops
}

fn plan_zone_create(
    topology: &TopologySpec,
    dialect: ApiDialect,
    zone: &Zone,
    ops: &mut Vec<ResourceOperation>,
) {
    if let Some(cidr) = &zone.address_prefix {
        ops.push(
            ResourceOperation::new(
                ResourceKind::AddressPrefix,
                address_prefix_name(&zone.name),
                Step::CreateAddressPrefix { cidr: cidr.clone() },
            )
            .in_zone(&zone.name),
        );
    }

    let gateway = public_gateway_name(&topology.vpc, &zone.name);
    let mut gateway_planned = false;

    for subnet in &zone.subnets {
        let network_acl = subnet
            .network_acl
            .clone()
            .filter(|_| dialect.supports(ResourceKind::NetworkAcl));
        ops.push(
            ResourceOperation::new(
                ResourceKind::Subnet,
                &subnet.name,
                Step::CreateSubnet {
                    ipv4_cidr_block: subnet.ipv4_cidr_block.clone(),
                    network_acl,
                },
            )
            .in_zone(&zone.name),
        );

        if subnet.public_gateway {
            if !gateway_planned {
                ops.push(
                    ResourceOperation::new(
                        ResourceKind::PublicGateway,
                        &gateway,
                        Step::EnsurePublicGateway,
                    )
                    .in_zone(&zone.name),
                );
                gateway_planned = true;
            }
            ops.push(
                ResourceOperation::new(
                    ResourceKind::Subnet,
                    &subnet.name,
                    Step::AttachPublicGateway {
                        gateway: gateway.clone(),
                    },
                )
                .in_zone(&zone.name),
            );
        }

        if dialect.supports(ResourceKind::VpnGateway) {
            for vpn in &subnet.vpn {
                ops.push(
                    ResourceOperation::new(
                        ResourceKind::VpnGateway,
                        &vpn.name,
                        Step::CreateVpnGateway,
                    )
                    .in_zone(&zone.name)
                    .in_subnet(&subnet.name),
                );
                for connection in &vpn.connections {
                    ops.push(
                        ResourceOperation::new(
                            ResourceKind::VpnConnection,
                            &connection.name,
                            Step::CreateVpnConnection {
                                gateway: vpn.name.clone(),
                                connection: connection.clone(),
                            },
                        )
                        .in_zone(&zone.name),
                    );
                }
            }
        } else if !subnet.vpn.is_empty() {
            warn!(subnet = %subnet.name, dialect = %dialect, "VPN gateways are not managed for this generation");
        }

        let mut floating = Vec::new();
        for descriptor in &subnet.instances {
            let Some(template) = topology.template(&descriptor.template) else {
                warn!(instance = %descriptor.name, template = %descriptor.template, "Unknown instance template");
                continue;
            };
            for name in
                expand_instance_names(descriptor, &zone.name, topology.zone_qualified_names)
            {
                ops.push(
                    ResourceOperation::new(
                        ResourceKind::Instance,
                        &name,
                        Step::CreateInstance {
                            template: template.clone(),
                            security_group: descriptor.security_group.clone(),
                        },
                    )
                    .in_zone(&zone.name)
                    .in_subnet(&subnet.name),
                );
                if descriptor.floating_ip {
                    floating.push(name);
                }
            }
        }

        for instance in floating {
            ops.push(
                ResourceOperation::new(
                    ResourceKind::FloatingIp,
                    floating_ip_name(&instance),
                    Step::AssignFloatingIp { instance },
                )
                .in_zone(&zone.name)
                .in_subnet(&subnet.name),
            );
        }
    }
}

fn plan_destroy(topology: &TopologySpec, dialect: ApiDialect) -> Vec<ResourceOperation> {
    let mut ops = Vec::new();

    if dialect.supports(ResourceKind::LoadBalancer) {
        for lb in topology.load_balancers.iter().rev() {
            ops.push(ResourceOperation::new(
                ResourceKind::LoadBalancer,
                &lb.name,
                Step::DeleteLoadBalancer,
            ));
        }
    }

    for zone in topology.zones.iter().rev() {
        for subnet in zone.subnets.iter().rev() {
            plan_subnet_destroy(topology, dialect, zone, subnet, &mut ops);
        }

        // Every zone gateway, whether or not a subnet still asks for one
        ops.push(
            ResourceOperation::new(
                ResourceKind::PublicGateway,
                public_gateway_name(&topology.vpc, &zone.name),
                Step::DeletePublicGateway,
            )
            .in_zone(&zone.name),
        );

        if zone.address_prefix.is_some() {
            ops.push(
                ResourceOperation::new(
                    ResourceKind::AddressPrefix,
                    address_prefix_name(&zone.name),
                    Step::DeleteAddressPrefix,
                )
                .in_zone(&zone.name),
            );
        }
    }

    for group in topology.security_groups.iter().rev() {
        if topology.is_default_security_group(&group.name) {
            debug!(group = %group.name, "Skipping default security group");
            continue;
        }
        ops.push(ResourceOperation::new(
            ResourceKind::SecurityGroup,
            &group.name,
            Step::DeleteSecurityGroup,
        ));
    }

    ops.push(ResourceOperation::new(
        ResourceKind::Vpc,
        &topology.vpc,
        Step::DeleteVpc,
    ));

    if dialect.supports(ResourceKind::NetworkAcl) {
        for acl in topology.network_acls.iter().rev() {
            if topology.is_default_network_acl(&acl.name) {
                debug!(acl = %acl.name, "Skipping default network ACL");
                continue;
            }
            ops.push(ResourceOperation::new(
                ResourceKind::NetworkAcl,
                &acl.name,
                Step::DeleteNetworkAcl,
            ));
        }
    }

    for key in topology.ssh_keys.iter().rev() {
        ops.push(ResourceOperation::new(
            ResourceKind::SshKey,
            &key.name,
            Step::DeleteSshKey,
        ));
    }

    ops
}

fn plan_subnet_destroy(
    topology: &TopologySpec,
    dialect: ApiDialect,
    zone: &Zone,
    subnet: &Subnet,
    ops: &mut Vec<ResourceOperation>,
) {
    if subnet.public_gateway {
        ops.push(
            ResourceOperation::new(
                ResourceKind::Subnet,
                &subnet.name,
                Step::DetachPublicGateway,
            )
            .in_zone(&zone.name),
        );
    }

    if dialect.supports(ResourceKind::VpnGateway) {
        for vpn in subnet.vpn.iter().rev() {
            ops.push(
                ResourceOperation::new(ResourceKind::VpnGateway, &vpn.name, Step::DeleteVpnGateway)
                    .in_zone(&zone.name)
                    .in_subnet(&subnet.name),
            );
        }
    }

    for descriptor in subnet.instances.iter().rev() {
        let names = expand_instance_names(descriptor, &zone.name, topology.zone_qualified_names);
        for name in names.iter().rev() {
            ops.push(
                ResourceOperation::new(ResourceKind::Instance, name, Step::ReleaseFloatingIps)
                    .in_zone(&zone.name)
                    .in_subnet(&subnet.name),
            );
            ops.push(
                ResourceOperation::new(ResourceKind::Instance, name, Step::DeleteInstance)
                    .in_zone(&zone.name)
                    .in_subnet(&subnet.name),
            );
        }
    }

    ops.push(
        ResourceOperation::new(ResourceKind::Subnet, &subnet.name, Step::DeleteSubnet)
            .in_zone(&zone.name),
    );
}

/// Members of each pool, by instance name, in topology order
fn pool_members(topology: &TopologySpec, pools: &[vpcflow_core::PoolSpec]) -> Vec<MemberRef> {
    let mut members = Vec::new();
    for pool in pools {
        for zone in &topology.zones {
            for subnet in &zone.subnets {
                for descriptor in &subnet.instances {
                    if !descriptor.lb_pools.iter().any(|p| p == &pool.name) {
                        continue;
                    }
                    for instance in
                        expand_instance_names(descriptor, &zone.name, topology.zone_qualified_names)
                    {
                        members.push(MemberRef {
                            pool: pool.name.clone(),
                            instance,
                            port: pool.member_port,
                        });
                    }
                }
            }
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionType;
    use std::path::Path;
    use vpcflow_core::parse_topology_str;

    const TOPOLOGY: &str = r#"
region: us-south
generation: 1
vpc: acme-vpc
default_network_acl: acme-acl
default_security_group: acme-default-sg
network_acls:
  - name: acme-acl
  - name: acme-extra-acl
security_groups:
  - name: acme-default-sg
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
    public_key: ssh-rsa AAAA
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
        public_gateway: true
        instances:
          - name: web-%d
            quantity: 2
            template: web
            floating_ip: true
            lb_pools: [web-pool]
      - name: acme-subnet-2
        ipv4_cidr_block: 10.10.2.0/24
        public_gateway: true
load_balancers:
  - name: acme-lb
    subnets: [acme-subnet-1]
    listeners:
      - port: 80
        default_pool: web-pool
    pools:
      - name: web-pool
"#;

    fn topology(generation: u8) -> TopologySpec {
        let yaml = TOPOLOGY.replace("generation: 1", &format!("generation: {}", generation));
        parse_topology_str(&yaml, Path::new(".")).unwrap()
    }

    fn labels(plan: &Plan) -> Vec<String> {
        plan.operations.iter().map(|op| op.to_string()).collect()
    }

    #[test]
    fn test_create_order() {
        let plan = plan(&topology(1), ApiDialect::Gen1, Mode::Create);
        let pos = |kind, name: &str| plan.position(kind, name).unwrap();

        assert_eq!(pos(ResourceKind::Region, "us-south"), 0);
        assert!(pos(ResourceKind::NetworkAcl, "acme-acl") < pos(ResourceKind::Vpc, "acme-vpc"));
        assert!(
            pos(ResourceKind::Vpc, "acme-vpc") < pos(ResourceKind::SecurityGroup, "acme-web-sg")
        );
        assert!(
            pos(ResourceKind::SshKey, "acme-key")
                < pos(ResourceKind::AddressPrefix, "us-south-1-address-prefix")
        );
        assert!(
            pos(ResourceKind::AddressPrefix, "us-south-1-address-prefix")
                < pos(ResourceKind::Subnet, "acme-subnet-1")
        );
        assert!(
            pos(ResourceKind::Subnet, "acme-subnet-1")
                < pos(ResourceKind::Instance, "web-1-us-south-1")
        );
        assert!(
            pos(ResourceKind::Instance, "web-2-us-south-1")
                < pos(ResourceKind::FloatingIp, "web-1-us-south-1-fip")
        );
        assert_eq!(plan.operations.last().unwrap().kind, ResourceKind::LoadBalancer);
    }

    #[test]
    fn test_gateway_planned_once_per_zone() {
        let plan = plan(&topology(1), ApiDialect::Gen1, Mode::Create);
        let ensures = plan
            .operations
            .iter()
            .filter(|op| matches!(op.step, Step::EnsurePublicGateway))
            .count();
        let attaches = plan
            .operations
            .iter()
            .filter(|op| matches!(op.step, Step::AttachPublicGateway { .. }))
            .count();
        assert_eq!(ensures, 1);
        assert_eq!(attaches, 2);
        assert!(labels(&plan).contains(&"ensure public gateway 'acme-vpc-us-south-1-gw' in us-south-1".to_string()));
    }

    #[test]
    fn test_group_referencing_rules_are_deferred() {
        let plan = plan(&topology(1), ApiDialect::Gen1, Mode::Create);
        let create_web = plan
            .operations
            .iter()
            .find(|op| op.name == "acme-web-sg" && matches!(op.step, Step::CreateSecurityGroup { .. }))
            .unwrap();
        let Step::CreateSecurityGroup { rules } = &create_web.step else {
            unreachable!()
        };
        assert_eq!(rules.len(), 1);

        let deferred = plan
            .operations
            .iter()
            .position(|op| matches!(op.step, Step::AddSecurityGroupRules { .. }))
            .unwrap();
        let bastion = plan
            .position(ResourceKind::SecurityGroup, "acme-bastion-sg")
            .unwrap();
        assert!(bastion < deferred);
    }

    #[test]
    fn test_pool_members_from_instances() {
        let plan = plan(&topology(1), ApiDialect::Gen1, Mode::Create);
        let Step::CreateLoadBalancer { members, .. } = &plan.operations.last().unwrap().step else {
            panic!("last step should create the load balancer");
        };
        let names: Vec<&str> = members.iter().map(|m| m.instance.as_str()).collect();
        assert_eq!(names, vec!["web-1-us-south-1", "web-2-us-south-1"]);
        assert!(members.iter().all(|m| m.pool == "web-pool" && m.port == 80));
    }

    #[test]
    fn test_gen2_skips_gen1_only_resources() {
        let plan = plan(&topology(2), ApiDialect::Gen2, Mode::Create);
        assert!(plan.position(ResourceKind::NetworkAcl, "acme-acl").is_none());
        assert!(plan.position(ResourceKind::LoadBalancer, "acme-lb").is_none());
        let Step::CreateVpc {
            classic_access,
            default_network_acl,
        } = &plan.operations[plan.position(ResourceKind::Vpc, "acme-vpc").unwrap()].step
        else {
            unreachable!()
        };
        assert!(!classic_access);
        assert!(default_network_acl.is_none());
    }

    #[test]
    fn test_destroy_order() {
        let plan = plan(&topology(1), ApiDialect::Gen1, Mode::Destroy);
        let index = |step: fn(&Step) -> bool, name: &str| {
            plan.operations
                .iter()
                .position(|op| op.name == name && step(&op.step))
                .unwrap()
        };

        let release = index(|s| matches!(s, Step::ReleaseFloatingIps), "web-1-us-south-1");
        let delete_instance = index(|s| matches!(s, Step::DeleteInstance), "web-1-us-south-1");
        let detach = index(|s| matches!(s, Step::DetachPublicGateway), "acme-subnet-1");
        let delete_subnet = index(|s| matches!(s, Step::DeleteSubnet), "acme-subnet-1");
        let delete_gateway = index(
            |s| matches!(s, Step::DeletePublicGateway),
            "acme-vpc-us-south-1-gw",
        );
        let delete_prefix = index(
            |s| matches!(s, Step::DeleteAddressPrefix),
            "us-south-1-address-prefix",
        );
        let delete_vpc = index(|s| matches!(s, Step::DeleteVpc), "acme-vpc");

        assert_eq!(plan.operations[0].kind, ResourceKind::LoadBalancer);
        assert!(release < delete_instance);
        assert!(delete_instance < delete_subnet);
        assert!(detach < delete_subnet);
        assert!(delete_subnet < delete_gateway);
        assert!(delete_gateway < delete_prefix);
        assert!(delete_prefix < delete_vpc);
        assert_eq!(plan.summary().create, 0);
        assert!(plan.operations_by_type(ActionType::Create).is_empty());
    }

    #[test]
    fn test_destroy_removes_zone_gateway_without_flag() {
        let yaml = TOPOLOGY.replace("public_gateway: true", "public_gateway: false");
        let topology = parse_topology_str(&yaml, Path::new(".")).unwrap();
        let plan = plan(&topology, ApiDialect::Gen1, Mode::Destroy);

        assert!(
            plan.position(ResourceKind::PublicGateway, "acme-vpc-us-south-1-gw")
                .is_some()
        );
        assert!(
            !plan
                .operations
                .iter()
                .any(|op| matches!(op.step, Step::DetachPublicGateway))
        );
    }

    #[test]
    fn test_destroy_never_targets_defaults() {
        let plan = plan(&topology(1), ApiDialect::Gen1, Mode::Destroy);
        assert!(plan.position(ResourceKind::SecurityGroup, "acme-default-sg").is_none());
        assert!(plan.position(ResourceKind::NetworkAcl, "acme-acl").is_none());
        assert!(plan.position(ResourceKind::NetworkAcl, "acme-extra-acl").is_some());
    }

    #[test]
    fn test_name_expansion_counts() {
        let plan = plan(&topology(1), ApiDialect::Gen1, Mode::Create);
        let instances: Vec<&str> = plan
            .operations
            .iter()
            .filter(|op| op.kind == ResourceKind::Instance)
            .map(|op| op.name.as_str())
            .collect();
        assert_eq!(instances, vec!["web-1-us-south-1", "web-2-us-south-1"]);
    }
}
