//! The on-disk RPG envelope: version-tagged nodes, edges and data-flow
//! edges, independent of any particular [`crate::store`] backend.

use crate::model::{DataFlowEdge, Edge, Node, RepositoryConfig};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const CURRENT_VERSION: &str = "1.0.0";

/// The full serialised graph envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEnvelope {
    pub version: String,
    pub config: RepositoryConfig,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_flow_edges: Vec<DataFlowEdge>,
}

impl GraphEnvelope {
    pub fn new(config: RepositoryConfig) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            config,
            nodes: Vec::new(),
            edges: Vec::new(),
            data_flow_edges: Vec::new(),
        }
    }
}

/// Validate the envelope's declared version against the version this
/// build understands. Only the major component must match.
pub fn validate_version(envelope: &GraphEnvelope) -> Result<()> {
    let current_major = CURRENT_VERSION.split('.').next().unwrap_or("0");
    let found_major = envelope.version.split('.').next().unwrap_or("0");
    if current_major != found_major {
        bail!(
            "RPG envelope version mismatch: expected major version {}, found {}",
            current_major,
            envelope.version
        );
    }
    Ok(())
}

pub fn to_json(envelope: &GraphEnvelope) -> Result<String> {
    serde_json::to_string_pretty(envelope).context("failed to serialize RPG envelope to JSON")
}

pub fn from_json(json: &str) -> Result<GraphEnvelope> {
    let envelope: GraphEnvelope =
        serde_json::from_str(json).context("failed to deserialize RPG envelope from JSON")?;
    validate_version(&envelope)?;
    Ok(envelope)
}
