use crate::output;
use std::path::Path;
use vpcflow_cloud::{ApiDialect, Mode};

pub fn handle(mode: Mode, yaml: Option<&Path>) -> anyhow::Result<()> {
    let topology = super::load_topology(yaml)?;
    let dialect = ApiDialect::from(topology.generation);
    let plan = vpcflow_cloud::plan(&topology, dialect, mode);
    output::print_plan(&plan);
    Ok(())
}
