//! `route list|add|delete`

use crate::session;
use crate::{RouteAction, RouteTarget};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use vpcflow_cloud::{ApiDialect, Outcome, ProviderClient, routes};
use vpcflow_core::Generation;

async fn open(target: &RouteTarget, settings: Option<&Path>) -> anyhow::Result<Arc<dyn ProviderClient>> {
    let settings = vpcflow_config::load_settings(settings)?;
    let generation = Generation::try_from(target.generation)?;
    session::connect(
        &settings,
        target.apikey.clone(),
        &target.region,
        ApiDialect::from(generation),
    )
    .await
}

fn print_outcome(outcome: &Outcome, destination: &str, zone: &str) {
    let line = format!("{} {} ({})", destination, zone, outcome);
    if outcome.is_change() {
        println!("{} {}", "✓".green(), line);
    } else {
        println!("{} {}", "•".dimmed(), line.dimmed());
    }
}

pub async fn handle(action: RouteAction, settings: Option<&Path>) -> anyhow::Result<()> {
    match action {
        RouteAction::List { target } => {
            let provider = open(&target, settings).await?;
            let found = routes::list_routes(provider.as_ref(), &target.vpc).await?;
            if found.is_empty() {
                println!("No custom routes in {}", target.vpc.cyan());
            }
            for route in found {
                println!(
                    "{}  {} → {}  ({})",
                    route.name.cyan(),
                    routes::route_destination(&route).unwrap_or_default(),
                    routes::route_next_hop(&route).unwrap_or_default(),
                    route.zone.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        RouteAction::Add {
            target,
            zone,
            destination,
            next_hop,
        } => {
            let provider = open(&target, settings).await?;
            let outcome =
                routes::add_route(provider.as_ref(), &target.vpc, &zone, &destination, &next_hop)
                    .await?;
            print_outcome(&outcome, &destination, &zone);
            Ok(())
        }
        RouteAction::Delete {
            target,
            zone,
            destination,
        } => {
            let provider = open(&target, settings).await?;
            let outcome =
                routes::delete_route(provider.as_ref(), &target.vpc, &zone, &destination).await?;
            print_outcome(&outcome, &destination, &zone);
            Ok(())
        }
    }
}
