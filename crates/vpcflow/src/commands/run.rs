//! `provision` and `destroy`

use crate::{output, session};
use colored::Colorize;
use std::path::Path;
use vpcflow_cloud::{ApiDialect, Executor, Mode};

pub async fn handle(
    mode: Mode,
    yaml: Option<&Path>,
    apikey: Option<&Path>,
    settings: Option<&Path>,
) -> anyhow::Result<()> {
    let topology = super::load_topology(yaml)?;
    let settings = vpcflow_config::load_settings(settings)?;
    let dialect = ApiDialect::from(topology.generation);

    println!(
        "{} {} VPC {} in {} ({})",
        "▶".blue(),
        match mode {
            Mode::Create => "Provisioning",
            Mode::Destroy => "Destroying",
        },
        topology.vpc.cyan(),
        topology.region,
        dialect
    );

    let key = session::api_key(apikey)?;
    let provider = session::connect(&settings, key, &topology.region, dialect).await?;

    let plan = vpcflow_cloud::plan(&topology, dialect, mode);
    let mut executor = Executor::new(provider, dialect, &topology.vpc)
        .with_waits(session::wait_settings(&settings));
    let report = executor.run_with_progress(&plan, output::progress).await;
    output::print_report(&report);

    report.into_result()?;
    Ok(())
}
