pub mod plan;
pub mod route;
pub mod run;

use anyhow::Context;
use std::path::Path;
use vpcflow_core::TopologySpec;

/// Locate and parse the topology file
pub fn load_topology(explicit: Option<&Path>) -> anyhow::Result<TopologySpec> {
    let path = vpcflow_config::find_topology_file(explicit)?;
    tracing::debug!("Loading topology from {}", path.display());
    vpcflow_core::load_topology(&path)
        .with_context(|| format!("Failed to load topology {}", path.display()))
}
