//! vpcflow topology model
//!
//! The desired-state document for a VPC deployment: region, generation,
//! network ACLs, security groups, keys, zones with their subnets and
//! instances, and load balancers. Loaded once per run and read-only after
//! that.

pub mod error;
pub mod loader;
pub mod model;
pub mod template;

pub use error::{Result, TopologyError};
pub use loader::{load_topology, parse_topology_str};
pub use model::*;
pub use template::{
    address_prefix_name, expand_instance_names, floating_ip_name, public_gateway_name,
};
