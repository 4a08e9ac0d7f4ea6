//! Core data model, storage and search for the Repository Planning Graph (RPG).
//!
//! An RPG is a dual-view graph: a High-Level hierarchy of architectural areas
//! and a Low-Level graph of concrete code entities (files, classes, functions,
//! methods), connected by functional (containment), dependency and data-flow
//! edges. See the crate's individual modules for the operation set.

pub mod cache;
pub mod config;
pub mod error;
pub mod feature;
pub mod lca;
pub mod model;
pub mod schema;
pub mod storage;
pub mod store;

pub use error::{RpgError, Warning, WarningKind};
pub use feature::SemanticFeature;
pub use model::{
    DataFlowEdge, DependencyEdge, DependencyType, Edge, FunctionalEdge, HighLevelNode,
    LowLevelKind, LowLevelNode, Metadata, Node, NodeId, NodePayload, NodeVariant, RepositoryConfig,
};
