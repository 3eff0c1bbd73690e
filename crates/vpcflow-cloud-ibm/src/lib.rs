//! IBM Cloud VPC provider for vpcflow
//!
//! Implements [`vpcflow_cloud::ProviderClient`] over the VPC REST API:
//!
//! - `iam` - API key to bearer token exchange
//! - `context` - immutable per-run request context
//! - `wire` - collection paths, create bodies, response decoding
//! - `client` - the HTTP client itself

pub mod client;
pub mod context;
pub mod error;
pub mod iam;
pub mod wire;

pub use client::{ConnectOptions, IbmVpcClient};
pub use context::ProviderContext;
pub use error::{IbmError, Result};
pub use iam::{BearerToken, exchange_api_key};
