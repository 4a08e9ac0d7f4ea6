//! MCP tool handlers — all tool methods in a single `#[tool_router]` impl
//! block, as the macro requires: `search`, `fetch`, `explore`, `encode`,
//! `evolve`, `stats`, plus the ten interactive tools.

use rmcp::{handler::server::wrapper::Parameters, tool, tool_router};
use rpg_core::error::RpgError;
use rpg_core::store::{GraphStore, TraverseDirection, TraverseEdgeType};
use rpg_encoder::{EncoderPipeline, EvolutionEngine, EvolutionOptions};

use crate::params::*;
use crate::server::RpgServer;

#[tool_router]
impl RpgServer {
    #[tool(
        description = "Search for nodes by feature description or snippet/path match. mode='features' runs semantic description search, 'snippets' matches names/paths, 'auto' (default) tries features first and falls back to snippets only if empty. strategy picks the retrieval algorithm (hybrid/vector/fts/string)."
    )]
    async fn search(&self, Parameters(params): Parameters<SearchParams>) -> Result<String, String> {
        let store = self.store.read().await;
        let mode = match params.mode.as_deref() {
            Some("features") => rpg_nav::SearchMode::Features,
            Some("snippets") => rpg_nav::SearchMode::Snippets,
            _ => rpg_nav::SearchMode::Auto,
        };
        let strategy = match params.strategy.as_deref() {
            Some("vector") => rpg_nav::SearchStrategy::Vector,
            Some("fts") => rpg_nav::SearchStrategy::Fts,
            Some("string") => rpg_nav::SearchStrategy::String,
            _ => rpg_nav::SearchStrategy::Hybrid,
        };
        let mut nav_params = rpg_nav::SearchParams::new(&params.query, mode, strategy);
        nav_params.file_pattern = params.file_pattern.as_deref();
        nav_params.scopes = params.scopes.as_deref();
        nav_params.limit = params.limit.unwrap_or(20);

        let hits = rpg_nav::search(&*store, &nav_params)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&hits_to_json(&hits)).map_err(|e| e.to_string())
    }

    #[tool(
        description = "Fetch one or more known nodes by id, returning each node's feature, source snippet (when available), and its root-to-node feature-path. At least one of code_entities or feature_entities must be non-empty."
    )]
    async fn fetch(&self, Parameters(params): Parameters<FetchParams>) -> Result<String, String> {
        let store = self.store.read().await;
        let code = params.code_entities.unwrap_or_default();
        let features = params.feature_entities.unwrap_or_default();
        if code.is_empty() && features.is_empty() {
            return Err("at least one of code_entities or feature_entities must be non-empty".into());
        }
        let outcome = rpg_nav::fetch(&*store, &code, &features)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&fetch_to_json(&outcome)).map_err(|e| e.to_string())
    }

    #[tool(
        description = "Explore the graph from a starting node: BFS/DFS up to max_depth, following functional/dependency/both edges in the given direction. Fails if start is unknown."
    )]
    async fn explore(&self, Parameters(params): Parameters<ExploreParams>) -> Result<String, String> {
        let store = self.store.read().await;
        let edge_type = match params.edge_type.as_deref() {
            Some("dependency") => TraverseEdgeType::Dependency,
            Some("both") => TraverseEdgeType::Both,
            _ => TraverseEdgeType::Functional,
        };
        let direction = match params.direction.as_deref() {
            Some("in") => TraverseDirection::In,
            Some("both") => TraverseDirection::Both,
            _ => TraverseDirection::Out,
        };
        let result = rpg_nav::explore(&*store, &params.start, edge_type, direction, params.max_depth.unwrap_or(3))
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&serde_json::json!({
            "nodes": result.nodes,
            "max_depth_reached": result.max_depth_reached,
            "edge_count": result.edges.len(),
        }))
        .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Run the full three-phase encoder (discovery, semantic lifting, structural reorganization, artifact grounding) against the project root, replacing the current in-memory graph. Persists the result. Phase 2 is skipped silently unless require_llm=true, in which case it fails without a configured LLM provider."
    )]
    async fn encode(&self, Parameters(params): Parameters<EncodeParams>) -> Result<String, String> {
        let mut config = self.config.read().await.clone();
        if let Some(include) = params.include {
            config.discovery.include = include;
        }
        if let Some(exclude) = params.exclude {
            config.discovery.exclude.extend(exclude);
        }
        match params.require_llm {
            Some(true) => config.semantic.use_llm = true,
            Some(false) => config.semantic.use_llm = false,
            None => {}
        }

        let pipeline = EncoderPipeline::new(config);
        let mut store = self.store.write().await;
        let result = pipeline
            .encode(&self.project_root, &mut *store)
            .await
            .map_err(|e| e.to_string())?;
        drop(store);
        self.persist().await?;

        serde_json::to_string_pretty(&serde_json::json!({
            "files_processed": result.files_processed,
            "low_level_nodes": result.low_level_nodes,
            "high_level_nodes": result.high_level_nodes,
            "dependency_edges": result.dependency_edges,
            "phase2_skipped": result.phase2_skipped,
            "duration_ms": result.duration.as_millis(),
            "warnings": result.warnings.iter().map(|w| w.message.clone()).collect::<Vec<_>>(),
        }))
        .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Incrementally update the graph from a git commit range (base_commit..HEAD): delete removed entities, re-extract and re-route modified ones past the drift threshold, insert new ones. Cheaper than a full encode; suggests a full re-encode when the change ratio is too large."
    )]
    async fn evolve(&self, Parameters(params): Parameters<EvolveParams>) -> Result<String, String> {
        let config = self.config.read().await.clone();
        let base_commit = params.base_commit;

        let options = EvolutionOptions {
            drift_threshold: config.evolution.drift_threshold,
            force_regenerate_threshold: config.evolution.force_regenerate_threshold,
            use_llm: params.use_llm.unwrap_or(config.semantic.use_llm),
            include_source: config.discovery.include_source,
        };
        let engine = EvolutionEngine::new(options);
        let mut store = self.store.write().await;
        let result = engine
            .evolve(&self.project_root, &base_commit, &mut *store, None)
            .await
            .map_err(|e| e.to_string())?;
        drop(store);
        self.persist().await?;

        serde_json::to_string_pretty(&serde_json::json!({
            "inserted": result.inserted,
            "deleted": result.deleted,
            "modified": result.modified,
            "rerouted": result.rerouted,
            "pruned_nodes": result.pruned_nodes,
            "duration_ms": result.duration.as_millis(),
            "llm_calls": result.llm_calls,
            "suggest_full_reencode": result.suggest_full_reencode,
            "errors": result.errors,
        }))
        .map_err(|e| e.to_string())
    }

    #[tool(description = "Return node/edge counts for the current graph.")]
    async fn stats(&self) -> Result<String, String> {
        let store = self.store.read().await;
        let s = store.stats().await.map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&serde_json::json!({
            "high_level_count": s.high_level_count,
            "low_level_count": s.low_level_count,
            "functional_edge_count": s.functional_edge_count,
            "dependency_edge_count": s.dependency_edge_count,
            "data_flow_edge_count": s.data_flow_edge_count,
        }))
        .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Interactive protocol step 1: discover files, parse, insert placeholder nodes, and precompute batches for lifting. Resets any prior interactive session state."
    )]
    async fn build_index(
        &self,
        Parameters(params): Parameters<BuildIndexParams>,
    ) -> Result<String, String> {
        let mut config = self.config.read().await.discovery.clone();
        if let Some(include) = params.include {
            config.include = include;
        }
        if let Some(exclude) = params.exclude {
            config.exclude.extend(exclude);
        }

        let mut session = self.session.write().await;
        let mut store = self.store.write().await;
        let result = session
            .build_index(&self.project_root, &config, &mut *store)
            .await
            .map_err(|e| e.to_string())?;
        drop(store);
        drop(session);
        self.persist().await?;

        serde_json::to_string_pretty(&serde_json::json!({
            "files_discovered": result.files_discovered,
            "entities_found": result.entities_found,
            "batch_count": result.batch_count,
            "next_action": result.next_action,
            "warnings": result.warnings.iter().map(|w| w.message.clone()).collect::<Vec<_>>(),
        }))
        .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Interactive protocol step 2: fetch one batch of entities (with source snippets) awaiting feature submission. scope='*' for every entity, or a file-path prefix / single entity id."
    )]
    async fn get_entity_batch(
        &self,
        Parameters(params): Parameters<GetEntityBatchParams>,
    ) -> Result<String, String> {
        let session = self.session.read().await;
        let batch = session
            .get_entity_batch(&params.scope, params.batch_index)
            .map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&serde_json::json!({
            "entities": batch.entities.iter().map(|e| serde_json::json!({
                "entity_id": e.entity_id,
                "kind": e.kind,
                "name": e.name,
                "parent": e.parent,
                "snippet": e.snippet,
            })).collect::<Vec<_>>(),
            "batch_index": batch.batch_index,
            "total_batches": batch.total_batches,
            "instructions": batch.instructions,
        }))
        .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Interactive protocol step 3: submit lifted features for a batch of entity ids (map of entity_id -> list of short feature phrases). Unknown ids are a hard error; re-submitting an entity whose new keywords drift far from its prior ones queues it for routing."
    )]
    async fn submit_features(
        &self,
        Parameters(params): Parameters<SubmitFeaturesParams>,
    ) -> Result<String, String> {
        let mut session = self.session.write().await;
        let mut store = self.store.write().await;
        let result = session
            .submit_features(params.features, &mut *store)
            .await
            .map_err(|e| e.to_string())?;
        drop(store);
        drop(session);
        self.persist().await?;

        serde_json::to_string_pretty(&serde_json::json!({
            "updated": result.updated,
            "drifted": result.drifted,
        }))
        .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Interactive protocol step 4: aggregate each file's feature from its already-lifted children. Call once all entity batches have been submitted."
    )]
    async fn finalize_features(&self) -> Result<String, String> {
        let mut session = self.session.write().await;
        let mut store = self.store.write().await;
        let result = session
            .finalize_features(&mut *store)
            .await
            .map_err(|e| e.to_string())?;
        drop(store);
        drop(session);
        self.persist().await?;

        serde_json::to_string_pretty(&serde_json::json!({
            "files_aggregated": result.files_aggregated,
            "next_action": result.next_action,
        }))
        .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Interactive protocol step 5a: fetch one batch of file-level features awaiting holistic synthesis."
    )]
    async fn get_synthesis_batch(
        &self,
        Parameters(params): Parameters<GetSynthesisBatchParams>,
    ) -> Result<String, String> {
        let session = self.session.read().await;
        let batch = session
            .get_synthesis_batch(params.batch_index)
            .map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&serde_json::json!({
            "files": batch.files.iter().map(|f| serde_json::json!({
                "file_path": f.file_path,
                "description": f.description,
                "keywords": f.keywords,
            })).collect::<Vec<_>>(),
            "batch_index": batch.batch_index,
            "total_batches": batch.total_batches,
        }))
        .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Interactive protocol step 5b: submit a holistic, comma-separated re-write of file features (map of file_path -> text)."
    )]
    async fn submit_synthesis(
        &self,
        Parameters(params): Parameters<SubmitSynthesisParams>,
    ) -> Result<String, String> {
        let mut session = self.session.write().await;
        let mut store = self.store.write().await;
        let result = session
            .submit_synthesis(params.syntheses, &mut *store)
            .await
            .map_err(|e| e.to_string())?;
        drop(store);
        drop(session);
        self.persist().await?;

        serde_json::to_string_pretty(&serde_json::json!({ "updated": result.updated })).map_err(|e| e.to_string())
    }

    #[tool(
        description = "Interactive protocol step 6a: fetch the file-feature groups (grouped by top-level directory) an agent should propose a three-level hierarchy path for."
    )]
    async fn get_hierarchy_context(&self) -> Result<String, String> {
        let session = self.session.read().await;
        let ctx = session.get_hierarchy_context();
        serde_json::to_string_pretty(&serde_json::json!({
            "groups": ctx.groups.iter().map(|g| serde_json::json!({
                "directory": g.directory,
                "files": g.files,
            })).collect::<Vec<_>>(),
            "instructions": ctx.instructions,
        }))
        .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Interactive protocol step 6b: submit a three-level 'Area/category/subcategory' hierarchy path for each file (map of file_path -> path string), building the High-Level spine."
    )]
    async fn submit_hierarchy(
        &self,
        Parameters(params): Parameters<SubmitHierarchyParams>,
    ) -> Result<String, String> {
        let mut session = self.session.write().await;
        let mut store = self.store.write().await;
        let result = session
            .submit_hierarchy(params.assignments, &mut *store)
            .await
            .map_err(|e| e.to_string())?;
        drop(store);
        drop(session);
        self.persist().await?;

        serde_json::to_string_pretty(&serde_json::json!({
            "areas_created": result.areas_created,
            "files_routed": result.files_routed,
        }))
        .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Interactive protocol step 7a: fetch one batch of entities pending a routing decision (their feature drifted from a prior submission). Returns the graph_revision that a subsequent submit_routing call must echo back."
    )]
    async fn get_routing_batch(
        &self,
        Parameters(params): Parameters<GetRoutingBatchParams>,
    ) -> Result<String, String> {
        let session = self.session.read().await;
        let batch = session
            .get_routing_batch(params.batch_index)
            .map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&serde_json::json!({
            "entries": batch.entries.iter().map(|e| serde_json::json!({
                "entity_id": e.entity_id,
                "file_node_id": e.file_node_id,
                "features": e.features,
                "reason": e.reason,
            })).collect::<Vec<_>>(),
            "batch_index": batch.batch_index,
            "total_batches": batch.total_batches,
            "graph_revision": batch.graph_revision,
        }))
        .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Interactive protocol step 7b: apply keep/move routing decisions (map of entity_id -> 'keep' or a new hierarchy path). The submitted revision must match the session's current graph_revision or the call fails without mutating state."
    )]
    async fn submit_routing(
        &self,
        Parameters(params): Parameters<SubmitRoutingParams>,
    ) -> Result<String, String> {
        let mut session = self.session.write().await;
        let mut store = self.store.write().await;
        let result = session
            .submit_routing(params.decisions, &params.revision, &mut *store)
            .await
            .map_err(|e| match e {
                RpgError::StaleRevision { expected, got } => {
                    format!("stale revision: expected {expected}, got {got}")
                }
                other => other.to_string(),
            })?;
        drop(store);
        drop(session);
        self.persist().await?;

        serde_json::to_string_pretty(&serde_json::json!({
            "applied": result.applied,
            "still_pending": result.still_pending,
        }))
        .map_err(|e| e.to_string())
    }
}

fn hits_to_json(hits: &[rpg_nav::SearchHit]) -> serde_json::Value {
    serde_json::json!(hits
        .iter()
        .map(|h| serde_json::json!({
            "node_id": h.node_id,
            "score": h.score,
            "path": h.path,
            "description": h.description,
        }))
        .collect::<Vec<_>>())
}

fn fetch_to_json(outcome: &rpg_nav::FetchOutcome) -> serde_json::Value {
    serde_json::json!({
        "entities": outcome.entities.iter().map(|e| serde_json::json!({
            "id": e.node.id,
            "description": e.node.feature.description,
            "keywords": e.node.feature.keywords,
            "source_code": e.source_code,
            "feature_path": e.feature_path,
            "path": e.node.path(),
        })).collect::<Vec<_>>(),
        "not_found": outcome.not_found,
    })
}
