//! MCP tool parameter structs — one per tool handler, deserialized from
//! JSON-RPC calls. Field docs become the per-parameter description in the
//! generated tool schema.

use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Parameters for the `search` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct SearchParams {
    /// The search query: a phrase for feature search, a path/name fragment for snippet search.
    pub(crate) query: String,
    /// Search mode: "features", "snippets", or "auto" (default). Auto runs feature search first and only falls back to snippets if that's empty.
    pub(crate) mode: Option<String>,
    /// Retrieval strategy: "hybrid" (default), "vector", "fts", or "string".
    pub(crate) strategy: Option<String>,
    /// Glob pattern restricting results to matching file paths (e.g. "src/**/*.ts").
    pub(crate) file_pattern: Option<String>,
    /// Node ids whose functional subtrees results must fall within.
    pub(crate) scopes: Option<Vec<String>>,
    /// Maximum number of results to return (default 20).
    pub(crate) limit: Option<usize>,
}

/// Parameters for the `fetch` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct FetchParams {
    /// Node ids to fetch as code entities.
    pub(crate) code_entities: Option<Vec<String>>,
    /// Node ids to fetch as feature/architecture entities. At least one of `code_entities` or `feature_entities` must be non-empty.
    pub(crate) feature_entities: Option<Vec<String>>,
}

/// Parameters for the `explore` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct ExploreParams {
    /// The node id to start traversal from.
    pub(crate) start: String,
    /// Which edge family to follow: "functional" (default), "dependency", or "both".
    pub(crate) edge_type: Option<String>,
    /// Traversal direction: "out" (default), "in", or "both".
    pub(crate) direction: Option<String>,
    /// Maximum traversal depth (default 3).
    pub(crate) max_depth: Option<usize>,
}

/// Parameters for the `encode` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct EncodeParams {
    /// Glob patterns to include (defaults to the configured discovery globs).
    pub(crate) include: Option<Vec<String>>,
    /// Glob patterns to exclude in addition to the configured defaults.
    pub(crate) exclude: Option<Vec<String>>,
    /// Whether Phase 2 (LLM-driven domain discovery) must run. If true and no provider is configured, the call fails instead of skipping Phase 2.
    pub(crate) require_llm: Option<bool>,
}

/// Parameters for the `evolve` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct EvolveParams {
    /// The commit the existing graph was last encoded at; changes are diffed from there to HEAD.
    pub(crate) base_commit: String,
    /// Whether to use an LLM to re-extract drifted features instead of the deterministic heuristic.
    pub(crate) use_llm: Option<bool>,
}

/// Parameters for the `build_index` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct BuildIndexParams {
    /// Glob patterns to include (defaults to the configured discovery globs).
    pub(crate) include: Option<Vec<String>>,
    /// Glob patterns to exclude in addition to the configured defaults.
    pub(crate) exclude: Option<Vec<String>>,
}

/// Parameters for the `get_entity_batch` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct GetEntityBatchParams {
    /// "*" for every discovered entity, or a file-path prefix / single entity id to scope the batch to.
    pub(crate) scope: String,
    /// Zero-based batch index within the scoped batch sequence.
    pub(crate) batch_index: usize,
}

/// Parameters for the `submit_features` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct SubmitFeaturesParams {
    /// Map of entity id to a list of short feature phrases describing its purpose.
    pub(crate) features: BTreeMap<String, Vec<String>>,
}

/// Parameters for the `get_synthesis_batch` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct GetSynthesisBatchParams {
    /// Zero-based batch index within the file-feature synthesis sequence.
    pub(crate) batch_index: usize,
}

/// Parameters for the `submit_synthesis` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct SubmitSynthesisParams {
    /// Map of file path to a holistic, comma-separated re-write of its feature description.
    pub(crate) syntheses: BTreeMap<String, String>,
}

/// Parameters for the `submit_hierarchy` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct SubmitHierarchyParams {
    /// Map of file path to a three-level "Area/category/subcategory" hierarchy path.
    pub(crate) assignments: BTreeMap<String, String>,
}

/// Parameters for the `get_routing_batch` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct GetRoutingBatchParams {
    /// Zero-based batch index within the pending-routing sequence.
    pub(crate) batch_index: usize,
}

/// Parameters for the `submit_routing` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub(crate) struct SubmitRoutingParams {
    /// Map of entity id to a decision: "keep", or a new "Area/category/subcategory" path to move it to.
    pub(crate) decisions: BTreeMap<String, String>,
    /// The `graph_revision` last read from `get_routing_batch`. Must match the session's current revision or the call fails.
    pub(crate) revision: String,
}
