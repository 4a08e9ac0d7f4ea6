//! The Graph Store abstraction (C1): a uniform capability set over a
//! persistent graph plus auxiliary text and vector indexes.
//!
//! [`GraphStore`] is the trait every backend implements; [`MemoryGraphStore`]
//! is the reference (and currently only) conformance implementation — it
//! backs both `open("memory")` and file-backed sessions, differing only in
//! whether [`GraphStore::close`] persists to disk.

pub mod memory;
pub mod text_index;
pub mod vector_index;

pub use memory::MemoryGraphStore;

use crate::error::RpgResult;
use crate::model::{DependencyType, Edge, Node, NodeId, NodeVariant};
use async_trait::async_trait;

/// Filter applied to [`GraphStore::get_nodes`].
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub variant: Option<NodeVariant>,
    pub entity_type: Option<String>,
    pub path_prefix: Option<String>,
}

/// Filter applied to [`GraphStore::get_edges`].
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub functional_only: bool,
    pub dependency_only: bool,
    pub dependency_type: Option<DependencyType>,
}

/// Which edge family [`GraphStore::traverse`] follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseEdgeType {
    Functional,
    Dependency,
    Both,
}

/// The direction [`GraphStore::traverse`] walks edges in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseDirection {
    Out,
    In,
    Both,
}

/// The outcome of a [`GraphStore::traverse`] call.
#[derive(Debug, Clone, Default)]
pub struct TraversalResult {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<Edge>,
    pub max_depth_reached: usize,
}

/// A scored search hit.
#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub node_id: NodeId,
    pub score: f64,
}

/// Stats returned by [`GraphStore::stats`].
#[derive(Debug, Clone, Default)]
pub struct GraphStats {
    pub high_level_count: usize,
    pub low_level_count: usize,
    pub functional_edge_count: usize,
    pub dependency_edge_count: usize,
    pub data_flow_edge_count: usize,
}

/// The uniform capability set every Graph Store backend implements.
///
/// All mutations either succeed fully or leave the store unchanged. Partial
/// failures of the text/vector side are reported as warnings, never as a
/// graph/text-index inconsistency: a node exists in the graph iff its text
/// document exists (the vector index is best-effort).
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn add_node(&mut self, node: Node) -> RpgResult<()>;
    async fn get_node(&self, id: &str) -> RpgResult<Option<Node>>;
    async fn has_node(&self, id: &str) -> RpgResult<bool>;
    async fn update_node(&mut self, id: &str, patch: NodePatch) -> RpgResult<()>;
    async fn remove_node(&mut self, id: &str) -> RpgResult<()>;
    async fn get_nodes(&self, filter: Option<NodeFilter>) -> RpgResult<Vec<Node>>;

    async fn add_edge(&mut self, edge: Edge) -> RpgResult<()>;
    async fn remove_edge(
        &mut self,
        source: &str,
        target: &str,
        functional: bool,
    ) -> RpgResult<()>;
    /// Record a value-transfer edge. Unlike [`GraphStore::add_edge`], both
    /// endpoints must already exist but the edge itself carries no type tag
    /// beyond its free-form `data_type`.
    async fn add_data_flow_edge(&mut self, edge: crate::model::DataFlowEdge) -> RpgResult<()>;
    async fn get_edges(&self, filter: Option<EdgeFilter>) -> RpgResult<Vec<Edge>>;
    async fn get_out_edges(&self, id: &str, functional_only: Option<bool>) -> RpgResult<Vec<Edge>>;
    async fn get_in_edges(&self, id: &str, functional_only: Option<bool>) -> RpgResult<Vec<Edge>>;

    async fn get_children(&self, id: &str) -> RpgResult<Vec<NodeId>>;
    async fn get_parent(&self, id: &str) -> RpgResult<Option<NodeId>>;
    async fn get_dependencies(&self, id: &str) -> RpgResult<Vec<NodeId>>;
    async fn get_dependents(&self, id: &str) -> RpgResult<Vec<NodeId>>;

    async fn traverse(
        &self,
        start: &str,
        edge_type: TraverseEdgeType,
        direction: TraverseDirection,
        max_depth: usize,
    ) -> RpgResult<TraversalResult>;

    async fn search_by_feature(
        &self,
        query: &str,
        scopes: Option<&[String]>,
    ) -> RpgResult<Vec<ScoredNode>>;

    async fn search_by_path(&self, pattern: &str) -> RpgResult<Vec<NodeId>>;

    async fn search_vector(&self, query_vector: &[f32], k: usize) -> RpgResult<Vec<ScoredNode>>;

    async fn search_hybrid(
        &self,
        query: &str,
        query_vector: Option<&[f32]>,
        k: usize,
        vector_weight: f64,
    ) -> RpgResult<Vec<ScoredNode>>;

    async fn topological_order(&self) -> RpgResult<Vec<NodeId>>;

    async fn stats(&self) -> RpgResult<GraphStats>;

    async fn export(&self) -> RpgResult<crate::schema::GraphEnvelope>;
    async fn import(&mut self, envelope: crate::schema::GraphEnvelope) -> RpgResult<()>;

    /// Release all handles held by this store. File-backed stores flush to
    /// disk here; in-memory-only sessions are a no-op.
    async fn close(&mut self) -> RpgResult<()>;
}

/// A partial update to a node's feature and/or metadata, merged in place
/// by [`GraphStore::update_node`].
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub feature: Option<crate::feature::SemanticFeature>,
    pub metadata: Option<crate::model::Metadata>,
    pub source_code: Option<String>,
}
