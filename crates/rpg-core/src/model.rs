//! The RPG data model: nodes, edges, features and repository configuration.
//!
//! A [`Node`] is either a [`HighLevelNode`] (architectural area) or a
//! [`LowLevelNode`] (concrete code entity); an
//! [`Edge`] is one of [`FunctionalEdge`] (containment), [`DependencyEdge`]
//! (uses) or [`DataFlowEdge`] (value transfer).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::feature::SemanticFeature;

pub type NodeId = String;

/// Which half of the dual view a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeVariant {
    HighLevel,
    LowLevel,
}

/// Kind of a Low-Level code entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowLevelKind {
    File,
    Class,
    Function,
    Method,
}

impl LowLevelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Class => "class",
            Self::Function => "function",
            Self::Method => "method",
        }
    }
}

/// Free-form structural metadata attached to a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub entity_type: Option<String>,
    pub path: Option<String>,
    pub qualified_name: Option<String>,
    pub language: Option<String>,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Fields unique to a High-Level (architectural area) node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighLevelNode {
    pub directory_path: Option<String>,
}

/// Fields unique to a Low-Level (concrete code entity) node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowLevelNode {
    pub kind: LowLevelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
}

/// The variant-specific payload of a [`Node`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodePayload {
    HighLevel(HighLevelNode),
    LowLevel(LowLevelNode),
}

/// A single node in the RPG: identity, variant payload, semantic feature and
/// optional structural metadata. Invariant: `id` is unique across the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(flatten)]
    pub payload: NodePayload,
    pub feature: SemanticFeature,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Node {
    pub fn new_high_level(id: impl Into<String>, feature: SemanticFeature) -> Self {
        Self {
            id: id.into(),
            payload: NodePayload::HighLevel(HighLevelNode {
                directory_path: None,
            }),
            feature,
            metadata: None,
        }
    }

    pub fn new_low_level(
        id: impl Into<String>,
        kind: LowLevelKind,
        feature: SemanticFeature,
    ) -> Self {
        Self {
            id: id.into(),
            payload: NodePayload::LowLevel(LowLevelNode {
                kind,
                source_code: None,
            }),
            feature,
            metadata: None,
        }
    }

    pub fn variant(&self) -> NodeVariant {
        match self.payload {
            NodePayload::HighLevel(_) => NodeVariant::HighLevel,
            NodePayload::LowLevel(_) => NodeVariant::LowLevel,
        }
    }

    pub fn low_level_kind(&self) -> Option<LowLevelKind> {
        match &self.payload {
            NodePayload::LowLevel(l) => Some(l.kind),
            NodePayload::HighLevel(_) => None,
        }
    }

    pub fn directory_path(&self) -> Option<&str> {
        match &self.payload {
            NodePayload::HighLevel(h) => h.directory_path.as_deref(),
            NodePayload::LowLevel(_) => None,
        }
    }

    pub fn source_code(&self) -> Option<&str> {
        match &self.payload {
            NodePayload::LowLevel(l) => l.source_code.as_deref(),
            NodePayload::HighLevel(_) => None,
        }
    }

    /// Path used to build the per-node text-index document.
    pub fn path(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.path.as_deref())
    }

    pub fn qualified_name(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.qualified_name.as_deref())
    }
}

/// Containment (parent → child) edge. Functional edges form a forest: each
/// node has at most one incoming functional edge (invariant 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionalEdge {
    pub parent: NodeId,
    pub child: NodeId,
    pub level: Option<usize>,
    pub sibling_order: Option<usize>,
}

/// The relationship a dependency edge expresses between source and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Import,
    Call,
    Inherit,
    Implement,
    Use,
}

impl DependencyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Call => "call",
            Self::Inherit => "inherit",
            Self::Implement => "implement",
            Self::Use => "use",
        }
    }
}

/// `source` uses `target`. Dependency edges may form cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub dependency_type: DependencyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_runtime: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// A value transfer `from` → `to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFlowEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub data_id: String,
    pub data_type: String,
}

/// A directed, typed edge. `Functional` and `Dependency` share the on-disk
/// edge array; `DataFlow` edges are stored separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Edge {
    Functional(FunctionalEdge),
    Dependency(DependencyEdge),
}

impl Edge {
    pub fn endpoints(&self) -> (&str, &str) {
        match self {
            Self::Functional(f) => (&f.parent, &f.child),
            Self::Dependency(d) => (&d.source, &d.target),
        }
    }
}

/// Repository-level configuration stored alongside the graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
