//! VPC routing table maintenance
//!
//! Routes are identified by destination CIDR and zone. Adding a route that
//! already exists is a no-op, deleting one that is gone likewise.

use crate::classify::{Disposition, Verb, disposition};
use crate::error::{ReconcileError, Result};
use crate::provider::{CreateRequest, ProviderClient};
use crate::report::{Outcome, SkipReason};
use crate::resolver;
use crate::resource::{RemoteResource, ResourceKind, Scope, attr};
use tracing::{info, warn};

/// Derived route name: `<vpc>-<zone>-<destination>` with `/` and `.` as `-`
pub fn route_name(vpc: &str, zone: &str, destination: &str) -> String {
    format!(
        "{}-{}-{}",
        vpc,
        zone,
        destination.replace(['/', '.'], "-")
    )
}

pub fn route_destination(route: &RemoteResource) -> Option<String> {
    route.get_attribute(attr::DESTINATION)
}

pub fn route_next_hop(route: &RemoteResource) -> Option<String> {
    route.get_attribute(attr::NEXT_HOP)
}

async fn vpc_id(provider: &dyn ProviderClient, vpc: &str) -> Result<String> {
    Ok(resolver::require(provider, ResourceKind::Vpc, vpc, &Scope::global())
        .await?
        .id)
}

pub async fn list_routes(provider: &dyn ProviderClient, vpc: &str) -> Result<Vec<RemoteResource>> {
    let vpc_id = vpc_id(provider, vpc).await?;
    provider
        .list(ResourceKind::Route, &Scope::parent(vpc_id))
        .await
        .map_err(|e| ReconcileError::provider(Verb::List, ResourceKind::Route, vpc, e))
}

async fn find_route(
    provider: &dyn ProviderClient,
    vpc: &str,
    zone: &str,
    destination: &str,
) -> Result<(String, Option<RemoteResource>)> {
    let vpc_id = vpc_id(provider, vpc).await?;
    let routes = provider
        .list(ResourceKind::Route, &Scope::parent(&vpc_id))
        .await
        .map_err(|e| ReconcileError::provider(Verb::List, ResourceKind::Route, vpc, e))?;
    let found = routes.into_iter().find(|route| {
        route.zone.as_deref() == Some(zone)
            && route_destination(route).as_deref() == Some(destination)
    });
    Ok((vpc_id, found))
}

/// Ensure a route to `destination` via `next_hop` exists in `zone`
pub async fn add_route(
    provider: &dyn ProviderClient,
    vpc: &str,
    zone: &str,
    destination: &str,
    next_hop: &str,
) -> Result<Outcome> {
    let (vpc_id, existing) = find_route(provider, vpc, zone, destination).await?;
    if let Some(route) = existing {
        if route_next_hop(&route).as_deref() != Some(next_hop) {
            warn!(
                route = %route.name,
                next_hop = route_next_hop(&route).unwrap_or_default(),
                "Route exists with a different next hop, leaving it unchanged"
            );
        }
        return Ok(Outcome::Skipped(SkipReason::AlreadyExists));
    }

    let name = route_name(vpc, zone, destination);
    info!(route = %name, destination, next_hop, "Creating route");
    provider
        .create(&CreateRequest::Route {
            vpc_id,
            name: name.clone(),
            zone: zone.to_string(),
            destination: destination.to_string(),
            next_hop: next_hop.to_string(),
        })
        .await
        .map_err(|e| ReconcileError::provider(Verb::Create, ResourceKind::Route, &name, e))?;
    Ok(Outcome::Created)
}

/// Remove the route to `destination` in `zone`
pub async fn delete_route(
    provider: &dyn ProviderClient,
    vpc: &str,
    zone: &str,
    destination: &str,
) -> Result<Outcome> {
    let (vpc_id, existing) = find_route(provider, vpc, zone, destination).await?;
    let Some(route) = existing else {
        return Ok(Outcome::Skipped(SkipReason::AlreadyAbsent));
    };

    info!(route = %route.name, destination, "Deleting route");
    match provider
        .delete(ResourceKind::Route, &route.id, &Scope::parent(vpc_id))
        .await
    {
        Ok(()) => Ok(Outcome::Deleted),
        Err(err) if disposition(Verb::Delete, ResourceKind::Route, &err) == Disposition::Absent => {
            Ok(Outcome::Skipped(SkipReason::AlreadyAbsent))
        }
        Err(err) => Err(ReconcileError::provider(
            Verb::Delete,
            ResourceKind::Route,
            &route.name,
            err,
        )),
    }
}
