//! Model definitions
//!
//! Data model of the topology document, split by concern.

mod compute;
mod load_balancer;
mod network;
mod topology;

// Re-exports
pub use compute::*;
pub use load_balancer::*;
pub use network::*;
pub use topology::*;

use serde::{Deserialize, Deserializer};

/// Accepts either `name` or `{ name: ... }` for a reference field.
pub(crate) fn name_ref<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NameRef {
        Name(String),
        Object { name: String },
    }

    Ok(Option::<NameRef>::deserialize(deserializer)?.map(|r| match r {
        NameRef::Name(name) | NameRef::Object { name } => name,
    }))
}

pub(crate) fn default_true() -> bool {
    true
}
