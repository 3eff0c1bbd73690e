//! Name → identifier resolution
//!
//! Every lookup lists the scoped collection and matches by exact name, so a
//! result always reflects the provider's current state.

use crate::classify::{Disposition, Verb, disposition};
use crate::error::{ReconcileError, Result};
use crate::provider::ProviderClient;
use crate::resource::{RemoteResource, ResourceKind, Scope};
use tracing::debug;

/// Find the resource of `kind` named `name` in `scope`
///
/// `Ok(None)` when nothing matches, including when the enclosing collection
/// itself is gone.
pub async fn resolve(
    provider: &dyn ProviderClient,
    kind: ResourceKind,
    name: &str,
    scope: &Scope,
) -> Result<Option<RemoteResource>> {
    let resources = match provider.list(kind, scope).await {
        Ok(resources) => resources,
        Err(err) => match disposition(Verb::List, kind, &err) {
            Disposition::Absent => return Ok(None),
            _ => return Err(ReconcileError::provider(Verb::List, kind, name, err)),
        },
    };

    let found = resources.into_iter().find(|r| {
        r.name == name
            && match (&scope.vpc_id, &r.vpc_id) {
                (Some(wanted), Some(actual)) => wanted == actual,
                _ => true,
            }
    });

    debug!(
        kind = %kind,
        name,
        id = found.as_ref().map(|r| r.id.as_str()).unwrap_or("-"),
        "Resolved"
    );
    Ok(found)
}

/// Like [`resolve`], but a missing resource is fatal
pub async fn require(
    provider: &dyn ProviderClient,
    kind: ResourceKind,
    name: &str,
    scope: &Scope,
) -> Result<RemoteResource> {
    resolve(provider, kind, name, scope)
        .await?
        .ok_or_else(|| ReconcileError::missing(kind, name))
}
