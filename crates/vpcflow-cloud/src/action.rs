//! Planned operations

use crate::resource::ResourceKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use vpcflow_core::{
    AclRule, InstanceTemplate, LoadBalancerSpec, SecurityGroupRule, VpnConnectionSpec,
};

/// Direction of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Create,
    Destroy,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Create => write!(f, "create"),
            Mode::Destroy => write!(f, "destroy"),
        }
    }
}

/// Type of action an operation performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Precondition or lookup, never mutates
    Check,
    Create,
    /// Attach or bind an existing resource
    Update,
    Delete,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Check => write!(f, "check"),
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
        }
    }
}

/// Load balancer pool member, by instance name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub pool: String,
    pub instance: String,
    pub port: u16,
}

/// What to do with the named resource
///
/// Steps carry names only. Identifiers are resolved when the step runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    CheckRegion,
    LookupResourceGroup,
    CreateNetworkAcl {
        rules: Vec<AclRule>,
    },
    CreateVpc {
        classic_access: bool,
        default_network_acl: Option<String>,
    },
    CreateSecurityGroup {
        rules: Vec<SecurityGroupRule>,
    },
    /// Rules referencing other groups, added once every group exists
    AddSecurityGroupRules {
        rules: Vec<SecurityGroupRule>,
    },
    CreateSshKey {
        public_key: String,
        key_type: String,
    },
    CreateAddressPrefix {
        cidr: String,
    },
    CreateSubnet {
        ipv4_cidr_block: String,
        network_acl: Option<String>,
    },
    EnsurePublicGateway,
    AttachPublicGateway {
        gateway: String,
    },
    CreateVpnGateway,
    CreateVpnConnection {
        gateway: String,
        connection: VpnConnectionSpec,
    },
    CreateInstance {
        template: InstanceTemplate,
        security_group: Option<String>,
    },
    AssignFloatingIp {
        instance: String,
    },
    CreateLoadBalancer {
        spec: LoadBalancerSpec,
        members: Vec<MemberRef>,
    },
    DeleteLoadBalancer,
    DetachPublicGateway,
    DeleteVpnGateway,
    ReleaseFloatingIps,
    DeleteInstance,
    DeleteSubnet,
    DeletePublicGateway,
    DeleteAddressPrefix,
    DeleteSecurityGroup,
    DeleteVpc,
    DeleteNetworkAcl,
    DeleteSshKey,
}

impl Step {
    pub fn action_type(&self) -> ActionType {
        match self {
            Step::CheckRegion | Step::LookupResourceGroup => ActionType::Check,
            Step::CreateNetworkAcl { .. }
            | Step::CreateVpc { .. }
            | Step::CreateSecurityGroup { .. }
            | Step::AddSecurityGroupRules { .. }
            | Step::CreateSshKey { .. }
            | Step::CreateAddressPrefix { .. }
            | Step::CreateSubnet { .. }
            | Step::EnsurePublicGateway
            | Step::CreateVpnGateway
            | Step::CreateVpnConnection { .. }
            | Step::CreateInstance { .. }
            | Step::AssignFloatingIp { .. }
            | Step::CreateLoadBalancer { .. } => ActionType::Create,
            Step::AttachPublicGateway { .. } | Step::DetachPublicGateway => ActionType::Update,
            Step::DeleteLoadBalancer
            | Step::DeleteVpnGateway
            | Step::ReleaseFloatingIps
            | Step::DeleteInstance
            | Step::DeleteSubnet
            | Step::DeletePublicGateway
            | Step::DeleteAddressPrefix
            | Step::DeleteSecurityGroup
            | Step::DeleteVpc
            | Step::DeleteNetworkAcl
            | Step::DeleteSshKey => ActionType::Delete,
        }
    }
}

/// One planned step against one named resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceOperation {
    pub kind: ResourceKind,

    /// Name of the resource acted on; the idempotency key
    pub name: String,

    pub zone: Option<String>,

    /// Subnet the resource lives in, for instances and subnet-bound steps
    pub subnet: Option<String>,

    pub step: Step,
}

impl ResourceOperation {
    pub fn new(kind: ResourceKind, name: impl Into<String>, step: Step) -> Self {
        Self {
            kind,
            name: name.into(),
            zone: None,
            subnet: None,
            step,
        }
    }

    pub fn in_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn in_subnet(mut self, subnet: impl Into<String>) -> Self {
        self.subnet = Some(subnet.into());
        self
    }

    pub fn action_type(&self) -> ActionType {
        self.step.action_type()
    }
}

impl fmt::Display for ResourceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.step {
            Step::CheckRegion => write!(f, "check region '{}'", self.name)?,
            Step::LookupResourceGroup => write!(f, "look up resource group '{}'", self.name)?,
            Step::AddSecurityGroupRules { rules } => write!(
                f,
                "add {} group-referencing rules to security group '{}'",
                rules.len(),
                self.name
            )?,
            Step::EnsurePublicGateway => write!(f, "ensure public gateway '{}'", self.name)?,
            Step::AttachPublicGateway { gateway } => write!(
                f,
                "attach public gateway '{}' to subnet '{}'",
                gateway, self.name
            )?,
            Step::DetachPublicGateway => {
                write!(f, "detach public gateway from subnet '{}'", self.name)?
            }
            Step::CreateVpnConnection { gateway, .. } => write!(
                f,
                "create vpn connection '{}' on gateway '{}'",
                self.name, gateway
            )?,
            Step::AssignFloatingIp { instance } => write!(
                f,
                "assign floating ip '{}' to instance '{}'",
                self.name, instance
            )?,
            Step::ReleaseFloatingIps => {
                write!(f, "release floating ips of instance '{}'", self.name)?
            }
            step => write!(f, "{} {} '{}'", step.action_type(), self.kind, self.name)?,
        }
        if let Some(zone) = &self.zone {
            write!(f, " in {}", zone)?;
        }
        Ok(())
    }
}

/// Ordered operations for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub mode: Mode,
    pub operations: Vec<ResourceOperation>,
}

impl Plan {
    pub fn new(mode: Mode, operations: Vec<ResourceOperation>) -> Self {
        Self { mode, operations }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Get operations by type
    pub fn operations_by_type(&self, action_type: ActionType) -> Vec<&ResourceOperation> {
        self.operations
            .iter()
            .filter(|op| op.action_type() == action_type)
            .collect()
    }

    /// Position of the first operation on `kind`/`name`
    pub fn position(&self, kind: ResourceKind, name: &str) -> Option<usize> {
        self.operations
            .iter()
            .position(|op| op.kind == kind && op.name == name)
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            check: self.operations_by_type(ActionType::Check).len(),
            create: self.operations_by_type(ActionType::Create).len(),
            update: self.operations_by_type(ActionType::Update).len(),
            delete: self.operations_by_type(ActionType::Delete).len(),
        }
    }
}

/// Summary of planned operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub check: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} checks",
            self.create, self.update, self.delete, self.check
        )
    }
}
