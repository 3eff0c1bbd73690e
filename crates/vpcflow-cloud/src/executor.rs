//! Plan executor
//!
//! Runs operations strictly in plan order. Each step re-resolves its
//! resource by name, so a plan can be executed any number of times and
//! converges to the same end state. Identifiers discovered or created
//! during the run are handed off to later steps through a run-local table
//! that is dropped with the executor.

use crate::action::{MemberRef, Plan, ResourceOperation, Step};
use crate::classify::{Disposition, Verb, disposition};
use crate::dialect::ApiDialect;
use crate::error::{ReconcileError, Result};
use crate::provider::{
    CreateRequest, InstanceRequest, LoadBalancerRequest, PoolMember, PoolRequest,
    ProviderClient, ProviderResult, RuleRemote, SecurityGroupRuleRequest,
};
use crate::report::{Outcome, RunReport, SkipReason, StepRecord};
use crate::resolver;
use crate::resource::{RemoteResource, ResourceKind, Scope};
use crate::waiter::{PollPolicy, WaitOutcome, WaitSettings, wait_for};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use vpcflow_core::{AclRule, InstanceTemplate, LoadBalancerSpec, SecurityGroupRule, VpnConnectionSpec};

/// Progress notifications emitted by [`Executor::run_with_progress`]
#[derive(Debug)]
pub enum Progress<'a> {
    Started {
        index: usize,
        total: usize,
        operation: &'a ResourceOperation,
    },
    Finished(&'a StepRecord),
}

enum Settled<T> {
    Done(T),
    Absent,
    Tolerated,
}

fn settle<T>(
    result: ProviderResult<T>,
    verb: Verb,
    kind: ResourceKind,
    name: &str,
) -> Result<Settled<T>> {
    match result {
        Ok(value) => Ok(Settled::Done(value)),
        Err(err) => match disposition(verb, kind, &err) {
            Disposition::Absent => Ok(Settled::Absent),
            Disposition::Tolerated => Ok(Settled::Tolerated),
            Disposition::Fatal(_) => Err(ReconcileError::provider(verb, kind, name, err)),
        },
    }
}

const ABSENT: Outcome = Outcome::Skipped(SkipReason::AlreadyAbsent);

pub struct Executor {
    provider: Arc<dyn ProviderClient>,
    dialect: ApiDialect,
    waits: WaitSettings,
    vpc_name: String,
    resource_group_id: Option<String>,
    handoffs: HashMap<(ResourceKind, String), RemoteResource>,
    /// Default ACL and security group ids of the VPC, never deleted
    protected: HashSet<String>,
}

impl Executor {
    pub fn new(provider: Arc<dyn ProviderClient>, dialect: ApiDialect, vpc: impl Into<String>) -> Self {
        Self {
            provider,
            dialect,
            waits: WaitSettings::default(),
            vpc_name: vpc.into(),
            resource_group_id: None,
            handoffs: HashMap::new(),
            protected: HashSet::new(),
        }
    }

    pub fn with_waits(mut self, waits: WaitSettings) -> Self {
        self.waits = waits;
        self
    }

    /// Identifier handed off by an earlier step of this run
    pub fn handoff(&self, kind: ResourceKind, name: &str) -> Option<&RemoteResource> {
        self.handoffs.get(&(kind, name.to_string()))
    }

    pub async fn run(&mut self, plan: &Plan) -> RunReport {
        self.run_with_progress(plan, |_| {}).await
    }

    /// Execute every operation in order, stopping at the first failure
    pub async fn run_with_progress<F>(&mut self, plan: &Plan, mut progress: F) -> RunReport
    where
        F: FnMut(Progress<'_>),
    {
        let mut report = RunReport::new(plan.mode);
        let started = Instant::now();
        let total = plan.len();
        info!(mode = %plan.mode, operations = total, provider = self.provider.name(), "Starting run");

        for (index, operation) in plan.operations.iter().enumerate() {
            progress(Progress::Started {
                index,
                total,
                operation,
            });

            let (outcome, failure) = match self.execute(operation).await {
                Ok(outcome) => (outcome, None),
                Err(err) => (Outcome::Failed(err.to_string()), Some(err)),
            };

            let record = StepRecord {
                index,
                kind: operation.kind,
                name: operation.name.clone(),
                description: operation.to_string(),
                outcome,
                resource_id: self
                    .handoff(operation.kind, &operation.name)
                    .map(|r| r.id.clone()),
            };
            progress(Progress::Finished(&record));
            report.records.push(record);

            if let Some(err) = failure {
                error!(step = index, operation = %operation, "Run aborted: {}", err);
                report.failure = Some(err);
                break;
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            summary = %report.summary(),
            duration_ms = report.duration_ms,
            "Run finished"
        );
        report
    }

    #[instrument(skip_all, fields(kind = %operation.kind, name = %operation.name))]
    pub async fn execute(&mut self, operation: &ResourceOperation) -> Result<Outcome> {
        let op = operation;
        match &op.step {
            Step::CheckRegion => self.check_region(op).await,
            Step::LookupResourceGroup => self.lookup_resource_group(op).await,
            Step::CreateNetworkAcl { rules } => self.create_network_acl(op, rules).await,
            Step::CreateVpc {
                classic_access,
                default_network_acl,
            } => {
                self.create_vpc(op, *classic_access, default_network_acl.as_deref())
                    .await
            }
            Step::CreateSecurityGroup { rules } => self.create_security_group(op, rules).await,
            Step::AddSecurityGroupRules { rules } => {
                self.add_security_group_rules(op, rules).await
            }
            Step::CreateSshKey {
                public_key,
                key_type,
            } => self.create_ssh_key(op, public_key, key_type).await,
            Step::CreateAddressPrefix { cidr } => self.create_address_prefix(op, cidr).await,
            Step::CreateSubnet {
                ipv4_cidr_block,
                network_acl,
            } => {
                self.create_subnet(op, ipv4_cidr_block, network_acl.as_deref())
                    .await
            }
            Step::EnsurePublicGateway => self.ensure_public_gateway(op).await,
            Step::AttachPublicGateway { gateway } => self.attach_public_gateway(op, gateway).await,
            Step::CreateVpnGateway => self.create_vpn_gateway(op).await,
            Step::CreateVpnConnection {
                gateway,
                connection,
            } => self.create_vpn_connection(op, gateway, connection).await,
            Step::CreateInstance {
                template,
                security_group,
            } => {
                self.create_instance(op, template, security_group.as_deref())
                    .await
            }
            Step::AssignFloatingIp { instance } => self.assign_floating_ip(op, instance).await,
            Step::CreateLoadBalancer { spec, members } => {
                self.create_load_balancer(op, spec, members).await
            }
            Step::DeleteLoadBalancer => self.delete_load_balancer(op).await,
            Step::DetachPublicGateway => self.detach_public_gateway(op).await,
            Step::DeleteVpnGateway => self.delete_vpn_gateway(op).await,
            Step::ReleaseFloatingIps => self.release_floating_ips(op).await,
            Step::DeleteInstance => self.delete_instance(op).await,
            Step::DeleteSubnet => self.delete_subnet(op).await,
            Step::DeletePublicGateway => {
                self.delete_vpc_scoped(op, |vpc| Scope::vpc(vpc)).await
            }
            Step::DeleteAddressPrefix => {
                self.delete_vpc_scoped(op, |vpc| Scope::parent(vpc)).await
            }
            Step::DeleteSecurityGroup => self.delete_security_group(op).await,
            Step::DeleteVpc => self.delete_vpc(op).await,
            Step::DeleteNetworkAcl => self.delete_global(op, true).await,
            Step::DeleteSshKey => self.delete_global(op, false).await,
        }
    }

    // Lookups and hand-offs

    fn remember(&mut self, kind: ResourceKind, name: &str, resource: RemoteResource) {
        if kind == ResourceKind::Vpc {
            self.protected
                .extend(resource.default_network_acl_id().into_iter());
            self.protected
                .extend(resource.default_security_group_id().into_iter());
        }
        self.handoffs.insert((kind, name.to_string()), resource);
    }

    fn forget(&mut self, kind: ResourceKind, name: &str) {
        self.handoffs.remove(&(kind, name.to_string()));
    }

    async fn lookup(
        &mut self,
        kind: ResourceKind,
        name: &str,
        scope: &Scope,
    ) -> Result<Option<RemoteResource>> {
        if let Some(known) = self.handoff(kind, name) {
            return Ok(Some(known.clone()));
        }
        let found = resolver::resolve(self.provider.as_ref(), kind, name, scope).await?;
        if let Some(resource) = &found {
            self.remember(kind, name, resource.clone());
        }
        Ok(found)
    }

    async fn lookup_required(
        &mut self,
        kind: ResourceKind,
        name: &str,
        scope: &Scope,
    ) -> Result<RemoteResource> {
        self.lookup(kind, name, scope)
            .await?
            .ok_or_else(|| ReconcileError::missing(kind, name))
    }

    async fn vpc(&mut self) -> Result<Option<RemoteResource>> {
        let name = self.vpc_name.clone();
        self.lookup(ResourceKind::Vpc, &name, &Scope::global()).await
    }

    async fn require_vpc(&mut self) -> Result<RemoteResource> {
        let name = self.vpc_name.clone();
        self.lookup_required(ResourceKind::Vpc, &name, &Scope::global())
            .await
    }

    /// Current provider view of a resource
    async fn refresh(&self, resource: &RemoteResource) -> Result<Option<RemoteResource>> {
        let result = self
            .provider
            .get(resource.kind, &resource.id, &Scope::global())
            .await;
        match settle(result, Verb::Get, resource.kind, &resource.name)? {
            Settled::Done(fresh) => Ok(Some(fresh)),
            _ => Ok(None),
        }
    }

    fn already_exists(&self, existing: &RemoteResource) -> Outcome {
        debug!(kind = %existing.kind, name = %existing.name, id = %existing.id, "Already exists");
        Outcome::Skipped(SkipReason::AlreadyExists)
    }

    async fn create(&mut self, request: CreateRequest) -> Result<RemoteResource> {
        let kind = request.kind();
        let name = request.name();
        info!(kind = %kind, name = %name, "Creating");
        let created = self
            .provider
            .create(&request)
            .await
            .map_err(|e| ReconcileError::provider(Verb::Create, kind, &name, e))?;
        info!(kind = %kind, name = %name, id = %created.id, "Created");
        self.remember(kind, &name, created.clone());
        Ok(created)
    }

    async fn delete_resource(&mut self, resource: &RemoteResource, scope: &Scope) -> Result<Outcome> {
        info!(kind = %resource.kind, name = %resource.name, id = %resource.id, "Deleting");
        let result = self.provider.delete(resource.kind, &resource.id, scope).await;
        let outcome = match settle(result, Verb::Delete, resource.kind, &resource.name)? {
            Settled::Done(()) => Outcome::Deleted,
            Settled::Absent => ABSENT,
            Settled::Tolerated => {
                warn!(kind = %resource.kind, name = %resource.name, "Provider refused deletion, treating as default resource");
                Outcome::Skipped(SkipReason::DefaultResource)
            }
        };
        self.forget(resource.kind, &resource.name);
        Ok(outcome)
    }

    // Waits

    /// Poll until the resource reports `state`
    ///
    /// With `vanish_ok` a resource that disappears while waiting yields
    /// `Ok(None)`; otherwise that is an error.
    async fn await_status(
        &self,
        resource: &RemoteResource,
        state: &'static str,
        policy: PollPolicy,
        vanish_ok: bool,
    ) -> Result<Option<RemoteResource>> {
        if resource.has_status(state) {
            return Ok(Some(resource.clone()));
        }

        let kind = resource.kind;
        let id = resource.id.clone();
        let name = resource.name.clone();
        let subject = format!("{} {} {}", kind, name, state);
        info!(kind = %kind, name = %name, state, "Waiting");

        let outcome = wait_for(&subject, &policy, |_| {
            let provider = Arc::clone(&self.provider);
            let id = id.clone();
            let name = name.clone();
            async move {
                match provider.get(kind, &id, &Scope::global()).await {
                    Ok(fresh) if fresh.has_status(state) => Ok(Some(Some(fresh))),
                    Ok(fresh) if fresh.has_status("failed") => Err(ReconcileError::UnexpectedState {
                        kind,
                        name,
                        message: format!("entered status 'failed' while waiting for '{}'", state),
                    }),
                    Ok(_) => Ok(None),
                    Err(err) => match disposition(Verb::Get, kind, &err) {
                        Disposition::Absent if vanish_ok => Ok(Some(None)),
                        Disposition::Absent => Err(ReconcileError::missing(kind, name)),
                        _ => Err(ReconcileError::provider(Verb::Get, kind, name, err)),
                    },
                }
            }
        })
        .await?;

        match outcome {
            WaitOutcome::Ready(value) => Ok(value),
            WaitOutcome::TimedOut { attempts } => Err(ReconcileError::WaitTimedOut {
                kind,
                name: resource.name.clone(),
                state: state.to_string(),
                attempts,
            }),
        }
    }

    /// Poll until resolving the name finds nothing
    async fn await_gone(&self, resource: &RemoteResource, scope: &Scope, policy: PollPolicy) -> Result<()> {
        let kind = resource.kind;
        let name = resource.name.clone();
        let subject = format!("{} {} deleted", kind, name);
        info!(kind = %kind, name = %name, "Waiting for deletion");

        let outcome = wait_for(&subject, &policy, |_| {
            let provider = Arc::clone(&self.provider);
            let name = name.clone();
            let scope = scope.clone();
            async move {
                let found = resolver::resolve(provider.as_ref(), kind, &name, &scope).await?;
                Ok::<_, ReconcileError>(found.is_none().then_some(()))
            }
        })
        .await?;

        match outcome {
            WaitOutcome::Ready(()) => Ok(()),
            WaitOutcome::TimedOut { attempts } => Err(ReconcileError::WaitTimedOut {
                kind,
                name,
                state: "deleted".to_string(),
                attempts,
            }),
        }
    }

    // Create steps

    async fn check_region(&mut self, op: &ResourceOperation) -> Result<Outcome> {
        let region = self
            .provider
            .region(&op.name)
            .await
            .map_err(|e| ReconcileError::provider(Verb::Get, ResourceKind::Region, &op.name, e))?;
        if !region.is_available() {
            return Err(ReconcileError::RegionUnavailable {
                region: region.name,
                status: region.status,
            });
        }
        info!(region = %region.name, "Region available");
        Ok(Outcome::Verified)
    }

    async fn lookup_resource_group(&mut self, op: &ResourceOperation) -> Result<Outcome> {
        let group = self
            .lookup_required(ResourceKind::ResourceGroup, &op.name, &Scope::global())
            .await?;
        info!(group = %group.name, id = %group.id, "Using resource group");
        self.resource_group_id = Some(group.id);
        Ok(Outcome::Verified)
    }

    async fn create_network_acl(&mut self, op: &ResourceOperation, rules: &[AclRule]) -> Result<Outcome> {
        if let Some(existing) = self.lookup(op.kind, &op.name, &Scope::global()).await? {
            return Ok(self.already_exists(&existing));
        }
        self.create(CreateRequest::NetworkAcl {
            name: op.name.clone(),
            rules: rules.to_vec(),
            resource_group_id: self.resource_group_id.clone(),
        })
        .await?;
        Ok(Outcome::Created)
    }

    async fn create_vpc(
        &mut self,
        op: &ResourceOperation,
        classic_access: bool,
        default_network_acl: Option<&str>,
    ) -> Result<Outcome> {
        if let Some(existing) = self.lookup(op.kind, &op.name, &Scope::global()).await? {
            return Ok(self.already_exists(&existing));
        }

        let default_network_acl_id = match default_network_acl {
            Some(acl) if self.dialect.requires_default_network_acl() => Some(
                self.lookup_required(ResourceKind::NetworkAcl, acl, &Scope::global())
                    .await?
                    .id,
            ),
            _ => None,
        };

        self.create(CreateRequest::Vpc {
            name: op.name.clone(),
            classic_access,
            default_network_acl_id,
            resource_group_id: self.resource_group_id.clone(),
        })
        .await?;
        Ok(Outcome::Created)
    }

    /// Build a rule request, resolving a remote group to its id now
    async fn rule_request(
        &mut self,
        rule: &SecurityGroupRule,
        scope: &Scope,
    ) -> Result<SecurityGroupRuleRequest> {
        let remote = if let Some(group) = &rule.remote_security_group {
            let id = self
                .lookup_required(ResourceKind::SecurityGroup, group, scope)
                .await?
                .id;
            RuleRemote::SecurityGroup(id)
        } else if let Some(cidr) = &rule.remote_cidr {
            RuleRemote::Cidr(cidr.clone())
        } else if let Some(address) = &rule.remote_address {
            RuleRemote::Address(address.clone())
        } else {
            RuleRemote::Any
        };

        Ok(SecurityGroupRuleRequest {
            direction: rule.direction.clone(),
            ip_version: rule.ip_version.clone(),
            protocol: rule.protocol.clone(),
            port_min: rule.port_min,
            port_max: rule.port_max,
            remote,
        })
    }

    async fn create_security_group(
        &mut self,
        op: &ResourceOperation,
        rules: &[SecurityGroupRule],
    ) -> Result<Outcome> {
        let vpc = self.require_vpc().await?;
        let scope = Scope::vpc(&vpc.id);
        if let Some(existing) = self.lookup(op.kind, &op.name, &scope).await? {
            return Ok(self.already_exists(&existing));
        }

        let mut requests = Vec::with_capacity(rules.len());
        for rule in rules {
            requests.push(self.rule_request(rule, &scope).await?);
        }

        self.create(CreateRequest::SecurityGroup {
            name: op.name.clone(),
            vpc_id: vpc.id,
            rules: requests,
            resource_group_id: self.resource_group_id.clone(),
        })
        .await?;
        Ok(Outcome::Created)
    }

    async fn add_security_group_rules(
        &mut self,
        op: &ResourceOperation,
        rules: &[SecurityGroupRule],
    ) -> Result<Outcome> {
        let vpc = self.require_vpc().await?;
        let scope = Scope::vpc(&vpc.id);
        let group = self
            .lookup_required(ResourceKind::SecurityGroup, &op.name, &scope)
            .await?;
        let rules_scope = Scope::parent(&group.id);

        let mut added = 0;
        for rule in rules {
            let request = self.rule_request(rule, &scope).await?;
            let signature = request.signature();
            let existing = resolver::resolve(
                self.provider.as_ref(),
                ResourceKind::SecurityGroupRule,
                &signature,
                &rules_scope,
            )
            .await?;
            if existing.is_some() {
                debug!(group = %group.name, rule = %signature, "Rule already present");
                continue;
            }
            self.create(CreateRequest::SecurityGroupRule {
                group_id: group.id.clone(),
                rule: request,
            })
            .await?;
            added += 1;
        }

        if added > 0 {
            Ok(Outcome::Created)
        } else {
            Ok(Outcome::Skipped(SkipReason::AlreadyExists))
        }
    }

    async fn create_ssh_key(
        &mut self,
        op: &ResourceOperation,
        public_key: &str,
        key_type: &str,
    ) -> Result<Outcome> {
        if let Some(existing) = self.lookup(op.kind, &op.name, &Scope::global()).await? {
            return Ok(self.already_exists(&existing));
        }
        self.create(CreateRequest::SshKey {
            name: op.name.clone(),
            public_key: public_key.to_string(),
            key_type: key_type.to_string(),
            resource_group_id: self.resource_group_id.clone(),
        })
        .await?;
        Ok(Outcome::Created)
    }

    async fn create_address_prefix(&mut self, op: &ResourceOperation, cidr: &str) -> Result<Outcome> {
        let zone = zone_of(op)?;
        let vpc = self.require_vpc().await?;
        if let Some(existing) = self.lookup(op.kind, &op.name, &Scope::parent(&vpc.id)).await? {
            return Ok(self.already_exists(&existing));
        }
        self.create(CreateRequest::AddressPrefix {
            vpc_id: vpc.id,
            name: op.name.clone(),
            zone,
            cidr: cidr.to_string(),
        })
        .await?;
        Ok(Outcome::Created)
    }

    async fn create_subnet(
        &mut self,
        op: &ResourceOperation,
        ipv4_cidr_block: &str,
        network_acl: Option<&str>,
    ) -> Result<Outcome> {
        let zone = zone_of(op)?;
        let vpc = self.require_vpc().await?;
        if let Some(existing) = self.lookup(op.kind, &op.name, &Scope::vpc(&vpc.id)).await? {
            return Ok(self.already_exists(&existing));
        }

        let network_acl_id = match network_acl {
            Some(acl) => Some(
                self.lookup_required(ResourceKind::NetworkAcl, acl, &Scope::global())
                    .await?
                    .id,
            ),
            None => None,
        };

        let created = self
            .create(CreateRequest::Subnet {
                name: op.name.clone(),
                vpc_id: vpc.id,
                zone,
                ipv4_cidr_block: ipv4_cidr_block.to_string(),
                network_acl_id,
                resource_group_id: self.resource_group_id.clone(),
            })
            .await?;

        if let Some(ready) = self
            .await_status(&created, "available", self.waits.subnet_available, false)
            .await?
        {
            self.remember(op.kind, &op.name, ready);
        }
        Ok(Outcome::Created)
    }

    async fn ensure_public_gateway(&mut self, op: &ResourceOperation) -> Result<Outcome> {
        let zone = zone_of(op)?;
        let vpc = self.require_vpc().await?;
        if let Some(existing) = self.lookup(op.kind, &op.name, &Scope::vpc(&vpc.id)).await? {
            return Ok(self.already_exists(&existing));
        }
        self.create(CreateRequest::PublicGateway {
            name: op.name.clone(),
            vpc_id: vpc.id,
            zone,
            resource_group_id: self.resource_group_id.clone(),
        })
        .await?;
        Ok(Outcome::Created)
    }

    async fn attach_public_gateway(&mut self, op: &ResourceOperation, gateway: &str) -> Result<Outcome> {
        let vpc = self.require_vpc().await?;
        let scope = Scope::vpc(&vpc.id);
        let subnet = self
            .lookup_required(ResourceKind::Subnet, &op.name, &scope)
            .await?;
        let gateway = self
            .lookup_required(ResourceKind::PublicGateway, gateway, &scope)
            .await?;
        let subnet = self
            .refresh(&subnet)
            .await?
            .ok_or_else(|| ReconcileError::missing(ResourceKind::Subnet, &op.name))?;

        match subnet.public_gateway_id() {
            Some(attached) if attached == gateway.id => {
                debug!(subnet = %subnet.name, gateway = %gateway.name, "Gateway already attached");
                return Ok(Outcome::Skipped(SkipReason::AlreadyExists));
            }
            Some(other) => {
                return Err(ReconcileError::UnexpectedState {
                    kind: ResourceKind::Subnet,
                    name: op.name.clone(),
                    message: format!("attached to a different public gateway ({})", other),
                });
            }
            None => {}
        }

        self.await_status(&subnet, "available", self.waits.subnet_available, false)
            .await?;

        info!(subnet = %subnet.name, gateway = %gateway.name, "Attaching public gateway");
        let attached = self
            .provider
            .attach_public_gateway(&subnet.id, &gateway.id)
            .await
            .map_err(|e| {
                ReconcileError::provider(Verb::Attach, ResourceKind::PublicGateway, &gateway.name, e)
            })?;
        debug!(gateway = %attached.id, "Public gateway attached");
        Ok(Outcome::Updated)
    }

    async fn create_vpn_gateway(&mut self, op: &ResourceOperation) -> Result<Outcome> {
        let subnet_name = subnet_of(op)?;
        let vpc = self.require_vpc().await?;
        let scope = Scope::vpc(&vpc.id);
        if let Some(existing) = self.lookup(op.kind, &op.name, &scope).await? {
            return Ok(self.already_exists(&existing));
        }
        let subnet = self
            .lookup_required(ResourceKind::Subnet, &subnet_name, &scope)
            .await?;

        let created = self
            .create(CreateRequest::VpnGateway {
                name: op.name.clone(),
                subnet_id: subnet.id,
                resource_group_id: self.resource_group_id.clone(),
            })
            .await?;
        if let Some(ready) = self
            .await_status(&created, "available", self.waits.vpn_gateway_available, false)
            .await?
        {
            self.remember(op.kind, &op.name, ready);
        }
        Ok(Outcome::Created)
    }

    async fn create_vpn_connection(
        &mut self,
        op: &ResourceOperation,
        gateway: &str,
        connection: &VpnConnectionSpec,
    ) -> Result<Outcome> {
        let vpc = self.require_vpc().await?;
        let gateway = self
            .lookup_required(ResourceKind::VpnGateway, gateway, &Scope::vpc(&vpc.id))
            .await?;
        if let Some(existing) = self
            .lookup(op.kind, &op.name, &Scope::parent(&gateway.id))
            .await?
        {
            return Ok(self.already_exists(&existing));
        }
        self.create(CreateRequest::VpnConnection {
            gateway_id: gateway.id,
            name: op.name.clone(),
            peer_address: connection.peer_address.clone(),
            psk: connection.psk.clone(),
            local_cidrs: connection.local_cidrs.clone(),
            peer_cidrs: connection.peer_cidrs.clone(),
        })
        .await?;
        Ok(Outcome::Created)
    }

    async fn create_instance(
        &mut self,
        op: &ResourceOperation,
        template: &InstanceTemplate,
        security_group: Option<&str>,
    ) -> Result<Outcome> {
        let zone = zone_of(op)?;
        let subnet_name = subnet_of(op)?;
        let vpc = self.require_vpc().await?;
        let vpc_scope = Scope::vpc(&vpc.id);
        let scope = vpc_scope.clone().with_subnet(&subnet_name);
        if let Some(existing) = self.lookup(op.kind, &op.name, &scope).await? {
            return Ok(self.already_exists(&existing));
        }

        let subnet = self
            .lookup_required(ResourceKind::Subnet, &subnet_name, &vpc_scope)
            .await?;
        let image = self
            .lookup_required(ResourceKind::Image, &template.image, &Scope::global())
            .await?;
        let key = self
            .lookup_required(ResourceKind::SshKey, &template.ssh_key, &Scope::global())
            .await?;
        let mut security_group_ids = Vec::new();
        if let Some(group) = security_group {
            security_group_ids.push(
                self.lookup_required(ResourceKind::SecurityGroup, group, &vpc_scope)
                    .await?
                    .id,
            );
        }

        self.create(CreateRequest::Instance(InstanceRequest {
            name: op.name.clone(),
            zone,
            vpc_id: vpc.id,
            subnet_id: subnet.id,
            image_id: image.id,
            profile: template.profile.clone(),
            key_id: key.id,
            security_group_ids,
            user_data: template.user_data.clone(),
            volumes: template.volumes.clone(),
            bandwidth: template.bandwidth,
            resource_group_id: self.resource_group_id.clone(),
        }))
        .await?;
        Ok(Outcome::Created)
    }

    async fn assign_floating_ip(&mut self, op: &ResourceOperation, instance: &str) -> Result<Outcome> {
        let subnet_name = subnet_of(op)?;
        let vpc = self.require_vpc().await?;
        let scope = Scope::vpc(&vpc.id).with_subnet(&subnet_name);
        if let Some(existing) = self.lookup(op.kind, &op.name, &Scope::global()).await? {
            return Ok(self.already_exists(&existing));
        }

        let instance = self
            .lookup_required(ResourceKind::Instance, instance, &scope)
            .await?;
        let running = self
            .await_status(&instance, "running", self.waits.instance_running, false)
            .await?
            .unwrap_or(instance);
        let interface = running
            .primary_interface_id()
            .ok_or_else(|| ReconcileError::UnexpectedState {
                kind: ResourceKind::Instance,
                name: running.name.clone(),
                message: "has no primary network interface".to_string(),
            })?;
        let instance_name = running.name.clone();
        self.remember(ResourceKind::Instance, &instance_name, running);

        self.create(CreateRequest::FloatingIp {
            name: op.name.clone(),
            target_interface_id: interface,
            resource_group_id: self.resource_group_id.clone(),
        })
        .await?;
        Ok(Outcome::Created)
    }

    async fn create_load_balancer(
        &mut self,
        op: &ResourceOperation,
        spec: &LoadBalancerSpec,
        members: &[MemberRef],
    ) -> Result<Outcome> {
        if let Some(existing) = self.lookup(op.kind, &op.name, &Scope::global()).await? {
            return Ok(self.already_exists(&existing));
        }
        let vpc = self.require_vpc().await?;
        let vpc_scope = Scope::vpc(&vpc.id);

        let mut subnet_ids = Vec::with_capacity(spec.subnets.len());
        for subnet in &spec.subnets {
            subnet_ids.push(
                self.lookup_required(ResourceKind::Subnet, subnet, &vpc_scope)
                    .await?
                    .id,
            );
        }

        let mut pools = Vec::with_capacity(spec.pools.len());
        for pool in &spec.pools {
            let mut pool_members = Vec::new();
            for member in members.iter().filter(|m| m.pool == pool.name) {
                let address = self.member_address(&member.instance, &vpc_scope).await?;
                pool_members.push(PoolMember {
                    address,
                    port: member.port,
                });
            }
            pools.push(PoolRequest {
                name: pool.name.clone(),
                algorithm: pool.algorithm.clone(),
                protocol: pool.protocol.clone(),
                health_monitor: pool.health_monitor.clone(),
                members: pool_members,
            });
        }

        self.create(CreateRequest::LoadBalancer(LoadBalancerRequest {
            name: op.name.clone(),
            is_public: spec.public,
            subnet_ids,
            listeners: spec.listeners.clone(),
            pools,
            resource_group_id: self.resource_group_id.clone(),
        }))
        .await?;
        Ok(Outcome::Created)
    }

    /// Private address of a pool member, taken from the hand-off when known
    async fn member_address(&mut self, instance: &str, scope: &Scope) -> Result<String> {
        let resource = self
            .lookup_required(ResourceKind::Instance, instance, scope)
            .await?;
        if let Some(address) = resource.primary_ipv4() {
            return Ok(address);
        }
        self.refresh(&resource)
            .await?
            .and_then(|fresh| fresh.primary_ipv4())
            .ok_or_else(|| ReconcileError::UnexpectedState {
                kind: ResourceKind::Instance,
                name: instance.to_string(),
                message: "has no primary IPv4 address".to_string(),
            })
    }

    // Destroy steps

    async fn delete_load_balancer(&mut self, op: &ResourceOperation) -> Result<Outcome> {
        let scope = Scope::global();
        let Some(lb) = self.lookup(op.kind, &op.name, &scope).await? else {
            return Ok(ABSENT);
        };
        let outcome = self.delete_resource(&lb, &scope).await?;
        if outcome == Outcome::Deleted {
            self.await_gone(&lb, &scope, self.waits.load_balancer_deleted)
                .await?;
        }
        Ok(outcome)
    }

    async fn detach_public_gateway(&mut self, op: &ResourceOperation) -> Result<Outcome> {
        let Some(vpc) = self.vpc().await? else {
            return Ok(ABSENT);
        };
        let Some(subnet) = self.lookup(op.kind, &op.name, &Scope::vpc(&vpc.id)).await? else {
            return Ok(ABSENT);
        };
        let Some(subnet) = self.refresh(&subnet).await? else {
            return Ok(ABSENT);
        };
        if subnet.public_gateway_id().is_none() {
            return Ok(ABSENT);
        }

        info!(subnet = %subnet.name, "Detaching public gateway");
        let result = self.provider.detach_public_gateway(&subnet.id).await;
        match settle(result, Verb::Detach, ResourceKind::PublicGateway, &subnet.name)? {
            Settled::Done(()) => Ok(Outcome::Updated),
            _ => Ok(ABSENT),
        }
    }

    async fn delete_vpn_gateway(&mut self, op: &ResourceOperation) -> Result<Outcome> {
        let Some(vpc) = self.vpc().await? else {
            return Ok(ABSENT);
        };
        let scope = Scope::vpc(&vpc.id);
        let Some(gateway) = self.lookup(op.kind, &op.name, &scope).await? else {
            return Ok(ABSENT);
        };
        let outcome = self.delete_resource(&gateway, &scope).await?;
        if outcome == Outcome::Deleted {
            self.await_gone(&gateway, &scope, self.waits.vpn_gateway_deleted)
                .await?;
        }
        Ok(outcome)
    }

    async fn release_floating_ips(&mut self, op: &ResourceOperation) -> Result<Outcome> {
        let subnet_name = subnet_of(op)?;
        let Some(vpc) = self.vpc().await? else {
            return Ok(ABSENT);
        };
        let scope = Scope::vpc(&vpc.id).with_subnet(&subnet_name);
        let Some(instance) = self.lookup(op.kind, &op.name, &scope).await? else {
            return Ok(ABSENT);
        };

        let result = self.provider.instance_floating_ips(&instance.id).await;
        let attached = match settle(result, Verb::Get, ResourceKind::FloatingIp, &op.name)? {
            Settled::Done(attached) if !attached.is_empty() => attached,
            _ => return Ok(ABSENT),
        };

        for binding in attached {
            let fip = binding.floating_ip.clone();
            info!(instance = %op.name, floating_ip = %fip.name, "Releasing floating ip");
            let result = self.provider.detach_floating_ip(&binding).await;
            if let Settled::Absent = settle(result, Verb::Detach, ResourceKind::FloatingIp, &fip.name)? {
                continue;
            }

            if self
                .await_status(&fip, "available", self.waits.floating_ip_available, true)
                .await?
                .is_some()
            {
                self.delete_resource(&fip, &Scope::global()).await?;
            }
        }
        Ok(Outcome::Updated)
    }

    async fn delete_instance(&mut self, op: &ResourceOperation) -> Result<Outcome> {
        let subnet_name = subnet_of(op)?;
        let Some(vpc) = self.vpc().await? else {
            return Ok(ABSENT);
        };
        let scope = Scope::vpc(&vpc.id).with_subnet(&subnet_name);
        let Some(instance) = self.lookup(op.kind, &op.name, &scope).await? else {
            return Ok(ABSENT);
        };
        let Some(instance) = self.refresh(&instance).await? else {
            self.forget(op.kind, &op.name);
            return Ok(ABSENT);
        };

        if !instance.has_status("stopped") {
            if !instance.has_status("stopping") {
                info!(instance = %instance.name, "Stopping");
                self.provider
                    .stop_instance(&instance.id)
                    .await
                    .map_err(|e| ReconcileError::provider(Verb::Stop, op.kind, &op.name, e))?;
            }
            let stopped = self
                .await_status(&instance, "stopped", self.waits.instance_stopped, true)
                .await?;
            if stopped.is_none() {
                self.forget(op.kind, &op.name);
                return Ok(ABSENT);
            }
        }

        let outcome = self.delete_resource(&instance, &scope).await?;
        if outcome == Outcome::Deleted {
            self.await_gone(&instance, &scope, self.waits.instance_deleted)
                .await?;
        }
        Ok(outcome)
    }

    async fn delete_subnet(&mut self, op: &ResourceOperation) -> Result<Outcome> {
        let Some(vpc) = self.vpc().await? else {
            return Ok(ABSENT);
        };
        let scope = Scope::vpc(&vpc.id);
        let Some(subnet) = self.lookup(op.kind, &op.name, &scope).await? else {
            return Ok(ABSENT);
        };
        let outcome = self.delete_resource(&subnet, &scope).await?;
        if outcome == Outcome::Deleted {
            self.await_gone(&subnet, &scope, self.waits.subnet_deleted)
                .await?;
        }
        Ok(outcome)
    }

    /// Delete a resource that lives under the VPC
    async fn delete_vpc_scoped(
        &mut self,
        op: &ResourceOperation,
        scope_for: impl FnOnce(&str) -> Scope,
    ) -> Result<Outcome> {
        let Some(vpc) = self.vpc().await? else {
            return Ok(ABSENT);
        };
        let scope = scope_for(&vpc.id);
        let Some(resource) = self.lookup(op.kind, &op.name, &scope).await? else {
            return Ok(ABSENT);
        };
        self.delete_resource(&resource, &scope).await
    }

    async fn delete_security_group(&mut self, op: &ResourceOperation) -> Result<Outcome> {
        let Some(vpc) = self.vpc().await? else {
            return Ok(ABSENT);
        };
        let scope = Scope::vpc(&vpc.id);
        let Some(group) = self.lookup(op.kind, &op.name, &scope).await? else {
            return Ok(ABSENT);
        };
        if self.protected.contains(&group.id) {
            debug!(group = %group.name, "Skipping VPC default security group");
            return Ok(Outcome::Skipped(SkipReason::DefaultResource));
        }
        self.delete_resource(&group, &scope).await
    }

    async fn delete_vpc(&mut self, op: &ResourceOperation) -> Result<Outcome> {
        let Some(vpc) = self.lookup(op.kind, &op.name, &Scope::global()).await? else {
            return Ok(ABSENT);
        };
        self.delete_resource(&vpc, &Scope::global()).await
    }

    async fn delete_global(&mut self, op: &ResourceOperation, check_default: bool) -> Result<Outcome> {
        let scope = Scope::global();
        let Some(resource) = self.lookup(op.kind, &op.name, &scope).await? else {
            return Ok(ABSENT);
        };
        if check_default && self.protected.contains(&resource.id) {
            debug!(kind = %resource.kind, name = %resource.name, "Skipping VPC default");
            return Ok(Outcome::Skipped(SkipReason::DefaultResource));
        }
        self.delete_resource(&resource, &scope).await
    }
}

fn zone_of(op: &ResourceOperation) -> Result<String> {
    op.zone.clone().ok_or_else(|| ReconcileError::UnexpectedState {
        kind: op.kind,
        name: op.name.clone(),
        message: "operation has no zone".to_string(),
    })
}

fn subnet_of(op: &ResourceOperation) -> Result<String> {
    op.subnet
        .clone()
        .ok_or_else(|| ReconcileError::UnexpectedState {
            kind: op.kind,
            name: op.name.clone(),
            message: "operation has no subnet".to_string(),
        })
}
