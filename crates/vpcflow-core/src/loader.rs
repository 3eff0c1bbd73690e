//! Topology loader
//!
//! Reads the YAML document, unwraps the list-wrapped form, resolves
//! cloud-init files and validates the result.

use crate::error::{Result, TopologyError};
use crate::model::TopologySpec;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Load and validate a topology file
///
/// `user_data_file` entries are resolved relative to the directory of
/// `path`.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_topology(path: &Path) -> Result<TopologySpec> {
    let content = std::fs::read_to_string(path).map_err(|e| TopologyError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let topology = parse_topology_str(&content, base_dir)?;
    info!(
        vpc = %topology.vpc,
        region = %topology.region,
        generation = %topology.generation,
        zones = topology.zones.len(),
        "Topology loaded"
    );
    Ok(topology)
}

/// Parse a topology document from a string
///
/// The document is either a mapping or a sequence whose first element is
/// the topology.
pub fn parse_topology_str(content: &str, base_dir: &Path) -> Result<TopologySpec> {
    let document: serde_yaml::Value = serde_yaml::from_str(content)?;

    let document = match document {
        serde_yaml::Value::Sequence(items) => {
            debug!(entries = items.len(), "Using first entry of topology list");
            items.into_iter().next().ok_or(TopologyError::Empty)?
        }
        serde_yaml::Value::Null => return Err(TopologyError::Empty),
        other => other,
    };

    let mut topology: TopologySpec = serde_yaml::from_value(document)?;
    resolve_user_data(&mut topology, base_dir)?;
    topology.validate()?;
    Ok(topology)
}

fn resolve_user_data(topology: &mut TopologySpec, base_dir: &Path) -> Result<()> {
    for template in &mut topology.instance_templates {
        if template.user_data.is_some() {
            continue;
        }
        if let Some(file) = &template.user_data_file {
            let path = base_dir.join(file);
            let content = std::fs::read_to_string(&path).map_err(|e| TopologyError::IoError {
                path: path.clone(),
                message: e.to_string(),
            })?;
            debug!(template = %template.name, file = %path.display(), "Loaded cloud-init payload");
            template.user_data = Some(content);
        }
    }
    Ok(())
}
