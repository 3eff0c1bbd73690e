//! Provider error classification
//!
//! Maps a failed call to an [`ErrorClass`] and decides, given the verb and
//! resource kind, whether the engine treats it as benign.

use crate::error::ProviderError;
use crate::resource::ResourceKind;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// A 2xx outside the expected set for the call
    UnexpectedSuccess,
    UnexpectedRedirect,
    InvalidRequest,
    AuthFailure,
    NotFound,
    Conflict,
    RateLimited,
    ServerError,
    Transport,
    /// Unparseable response or a status outside every other class
    Unexpected,
    Unsupported,
}

impl ErrorClass {
    /// Throttling, provider outages and network failures
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorClass::RateLimited | ErrorClass::ServerError | ErrorClass::Transport
        )
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorClass::UnexpectedSuccess => "unexpected success status",
            ErrorClass::UnexpectedRedirect => "unexpected redirect",
            ErrorClass::InvalidRequest => "invalid request",
            ErrorClass::AuthFailure => "authentication failure",
            ErrorClass::NotFound => "not found",
            ErrorClass::Conflict => "conflict",
            ErrorClass::RateLimited => "rate limited",
            ErrorClass::ServerError => "provider server error",
            ErrorClass::Transport => "transport failure",
            ErrorClass::Unexpected => "unexpected response",
            ErrorClass::Unsupported => "unsupported",
        };
        f.write_str(label)
    }
}

/// What the engine was doing when a call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    List,
    Get,
    Create,
    Delete,
    Attach,
    Detach,
    Stop,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verb::List => "list",
            Verb::Get => "get",
            Verb::Create => "create",
            Verb::Delete => "delete",
            Verb::Attach => "attach",
            Verb::Detach => "detach",
            Verb::Stop => "stop",
        };
        f.write_str(label)
    }
}

/// How the engine proceeds after a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The resource is already gone
    Absent,
    /// A documented benign failure (deleting a provider-managed default)
    Tolerated,
    Fatal(ErrorClass),
}

pub fn classify_status(status: u16) -> ErrorClass {
    match status {
        200..=299 => ErrorClass::UnexpectedSuccess,
        300..=399 => ErrorClass::UnexpectedRedirect,
        400 => ErrorClass::InvalidRequest,
        401 | 403 => ErrorClass::AuthFailure,
        404 => ErrorClass::NotFound,
        409 => ErrorClass::Conflict,
        429 => ErrorClass::RateLimited,
        500..=599 => ErrorClass::ServerError,
        _ => ErrorClass::Unexpected,
    }
}

pub fn classify_error(err: &ProviderError) -> ErrorClass {
    match err {
        ProviderError::Status { status, .. } => classify_status(*status),
        ProviderError::Transport { .. } => ErrorClass::Transport,
        ProviderError::Decode { .. } => ErrorClass::Unexpected,
        ProviderError::Unsupported { .. } => ErrorClass::Unsupported,
        ProviderError::Authentication(_) => ErrorClass::AuthFailure,
        ProviderError::MissingParent { .. } => ErrorClass::InvalidRequest,
    }
}

pub fn disposition(verb: Verb, kind: ResourceKind, err: &ProviderError) -> Disposition {
    match classify_error(err) {
        ErrorClass::NotFound
            if matches!(verb, Verb::Get | Verb::List | Verb::Delete | Verb::Detach) =>
        {
            Disposition::Absent
        }
        ErrorClass::Conflict
            if verb == Verb::Delete
                && matches!(kind, ResourceKind::NetworkAcl | ResourceKind::SecurityGroup) =>
        {
            Disposition::Tolerated
        }
        class => Disposition::Fatal(class),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ProviderError {
        ProviderError::Status {
            method: "DELETE".to_string(),
            url: "https://example.test/v1/vpcs/r1".to_string(),
            status: code,
            body: "{}".to_string(),
        }
    }

    #[test]
    fn test_classify_status_ranges() {
        assert_eq!(classify_status(202), ErrorClass::UnexpectedSuccess);
        assert_eq!(classify_status(302), ErrorClass::UnexpectedRedirect);
        assert_eq!(classify_status(400), ErrorClass::InvalidRequest);
        assert_eq!(classify_status(401), ErrorClass::AuthFailure);
        assert_eq!(classify_status(403), ErrorClass::AuthFailure);
        assert_eq!(classify_status(429), ErrorClass::RateLimited);
        assert_eq!(classify_status(503), ErrorClass::ServerError);
        assert_eq!(classify_status(418), ErrorClass::Unexpected);
    }

    #[test]
    fn test_not_found_is_absent_only_for_lookups_and_removals() {
        let err = status(404);
        assert_eq!(
            disposition(Verb::Delete, ResourceKind::Subnet, &err),
            Disposition::Absent
        );
        assert_eq!(
            disposition(Verb::Get, ResourceKind::Instance, &err),
            Disposition::Absent
        );
        assert_eq!(
            disposition(Verb::Detach, ResourceKind::PublicGateway, &err),
            Disposition::Absent
        );
        assert_eq!(
            disposition(Verb::Create, ResourceKind::Subnet, &err),
            Disposition::Fatal(ErrorClass::NotFound)
        );
    }

    #[test]
    fn test_conflict_tolerated_for_default_candidates() {
        let err = status(409);
        assert_eq!(
            disposition(Verb::Delete, ResourceKind::SecurityGroup, &err),
            Disposition::Tolerated
        );
        assert_eq!(
            disposition(Verb::Delete, ResourceKind::NetworkAcl, &err),
            Disposition::Tolerated
        );
        assert_eq!(
            disposition(Verb::Delete, ResourceKind::Subnet, &err),
            Disposition::Fatal(ErrorClass::Conflict)
        );
        assert_eq!(
            disposition(Verb::Create, ResourceKind::SecurityGroup, &err),
            Disposition::Fatal(ErrorClass::Conflict)
        );
    }

    #[test]
    fn test_transport_is_fatal_and_transient() {
        let err = ProviderError::Transport {
            method: "GET".to_string(),
            url: "https://example.test/v1/vpcs".to_string(),
            message: "connection reset".to_string(),
        };
        let Disposition::Fatal(class) = disposition(Verb::List, ResourceKind::Vpc, &err) else {
            panic!("transport errors must be fatal");
        };
        assert!(class.is_transient());
        assert!(!ErrorClass::InvalidRequest.is_transient());
    }
}
