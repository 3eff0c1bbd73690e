//! vpcflow reconciliation engine
//!
//! Drives a VPC topology toward its desired state through a provider
//! client, creating what is missing and deleting what should be gone.
//! Resources are identified by name only; nothing is cached across runs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  vpcflow CLI                     │
//! │       (provision / destroy / plan / route)       │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                vpcflow-cloud                     │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────────┐   │
//! │  │ Planner  │─▶│ Executor │─▶│  PollWaiter  │   │
//! │  └──────────┘  └────┬─────┘  └──────────────┘   │
//! │           ┌─────────▼─────────┐                  │
//! │           │ Resolver/Classify │                  │
//! │           └─────────┬─────────┘                  │
//! │  ┌──────────────────▼───────────────────────┐   │
//! │  │      trait ProviderClient { ... }         │   │
//! │  └──────────────────────────────────────────┘   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼────────┐
//!           │ vpcflow-cloud- │
//!           │      ibm       │
//!           └────────────────┘
//! ```

pub mod action;
pub mod classify;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod planner;
pub mod provider;
pub mod report;
pub mod resolver;
pub mod resource;
pub mod routes;
pub mod waiter;

// Re-exports
pub use action::{ActionType, MemberRef, Mode, Plan, PlanSummary, ResourceOperation, Step};
pub use classify::{Disposition, ErrorClass, Verb, classify_error, classify_status, disposition};
pub use dialect::ApiDialect;
pub use error::{ProviderError, ReconcileError, Result};
pub use executor::{Executor, Progress};
pub use planner::plan;
pub use provider::{
    AttachedFloatingIp, CreateRequest, InstanceRequest, LoadBalancerRequest, PoolMember,
    PoolRequest, ProviderClient, ProviderResult, RegionInfo, RuleRemote,
    SecurityGroupRuleRequest, rule_signature,
};
pub use report::{Outcome, RunReport, RunSummary, SkipReason, StepRecord};
pub use resource::{RemoteResource, ResourceKind, Scope, attr};
pub use waiter::{Attempts, PollPolicy, WaitOutcome, WaitSettings, wait_for};
