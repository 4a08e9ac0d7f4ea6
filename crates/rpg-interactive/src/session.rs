//! The interactive protocol's session state machine: an agent drives this
//! step by step, submitting semantic features and hierarchy decisions in
//! small batches instead of the encoder running a full autonomous pass.

use rpg_core::error::{RpgError, RpgResult, Warning};
use rpg_core::feature::{normalize_keywords, SemanticFeature};
use rpg_core::model::{Edge, FunctionalEdge, LowLevelKind, Metadata, Node, NodePayload};
use rpg_core::store::{GraphStore, NodePatch};
use rpg_encoder::discovery::{self, DiscoveredFile};
use rpg_encoder::grounding;
use rpg_encoder::hierarchy::{self, FileFeatureGroup};
use rpg_parser::{parse_source, Language};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Batches are packed so their summed (truncated) source length stays
/// under this budget — ~2000 tokens at a rough 4 chars/token.
const BATCH_TOKEN_BUDGET_CHARS: usize = 8000;
/// Hard cap on entities per batch regardless of budget.
const BATCH_MAX_ENTITIES: usize = 15;
/// Source snippets are truncated to this many characters when rendered.
const SNIPPET_RENDER_LIMIT: usize = 3000;
/// Drift above which a re-submitted feature queues a routing candidate.
const DRIFT_THRESHOLD: f64 = 0.5;

/// One liftable entity discovered by [`InteractiveSession::build_index`].
#[derive(Debug, Clone)]
pub struct LiftableEntity {
    pub entity_id: String,
    pub file_path: String,
    pub kind: String,
    pub name: String,
    pub parent: Option<String>,
    pub source_snippet: String,
}

/// An entity whose resubmitted feature drifted from its prior value enough
/// to warrant a human/agent routing decision.
#[derive(Debug, Clone)]
pub struct PendingRouting {
    pub file_node_id: String,
    pub entity_id: String,
    pub features: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BuildIndexResult {
    pub files_discovered: usize,
    pub entities_found: usize,
    pub batch_count: usize,
    pub next_action: &'static str,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone)]
pub struct RenderedEntity {
    pub entity_id: String,
    pub kind: String,
    pub name: String,
    pub parent: Option<String>,
    pub snippet: String,
}

#[derive(Debug)]
pub struct EntityBatchView {
    pub entities: Vec<RenderedEntity>,
    pub batch_index: usize,
    pub total_batches: usize,
    pub instructions: Option<&'static str>,
}

#[derive(Debug, Default)]
pub struct SubmitFeaturesResult {
    pub updated: usize,
    pub drifted: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FinalizeResult {
    pub files_aggregated: usize,
    pub next_action: &'static str,
}

#[derive(Debug, Clone)]
pub struct FileFeatureView {
    pub file_path: String,
    pub description: String,
    pub keywords: Vec<String>,
}

#[derive(Debug)]
pub struct SynthesisBatchView {
    pub files: Vec<FileFeatureView>,
    pub batch_index: usize,
    pub total_batches: usize,
}

#[derive(Debug, Default)]
pub struct SynthesisResult {
    pub updated: usize,
}

#[derive(Debug)]
pub struct HierarchyContextView {
    pub groups: Vec<FileFeatureGroup>,
    pub instructions: &'static str,
}

#[derive(Debug, Default)]
pub struct HierarchyResult {
    pub areas_created: usize,
    pub files_routed: usize,
}

#[derive(Debug)]
pub struct RoutingBatchView {
    pub entries: Vec<PendingRouting>,
    pub batch_index: usize,
    pub total_batches: usize,
    pub graph_revision: String,
}

#[derive(Debug, Default)]
pub struct RoutingResult {
    pub applied: usize,
    pub still_pending: usize,
}

const ENTITY_BATCH_INSTRUCTIONS: &str = concat!(
    "For each entity below, describe its purpose in 3-8 short feature phrases ",
    "(e.g. \"validate input\", \"return parsed result\"). Submit via submit_features ",
    "as a JSON object mapping entity_id to an array of phrases.",
);

const HIERARCHY_INSTRUCTIONS: &str = concat!(
    "Assign each file to a three-level path \"Area/category/subcategory\" that groups ",
    "related functionality (e.g. \"Authentication/sessions/login\"). Submit via ",
    "submit_hierarchy as a JSON object mapping file_path to path string.",
);

/// Single-writer session: mutating operations run sequentially against one
/// [`GraphStore`] handle.
#[derive(Default)]
pub struct InteractiveSession {
    entities: Vec<LiftableEntity>,
    batch_boundaries: Vec<(usize, usize)>,
    lifted_features: BTreeMap<String, Vec<String>>,
    file_features: BTreeMap<String, SemanticFeature>,
    synthesized_features: BTreeMap<String, SemanticFeature>,
    hierarchy_assignments: BTreeMap<String, String>,
    pending_routing: Vec<PendingRouting>,
    graph_revision: String,
}

impl InteractiveSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph_revision(&self) -> &str {
        &self.graph_revision
    }

    pub fn pending_routing(&self) -> &[PendingRouting] {
        &self.pending_routing
    }

    fn recompute_revision(&mut self) {
        let mut hasher = Sha256::new();
        for entity in &self.entities {
            hasher.update(entity.entity_id.as_bytes());
        }
        for (id, features) in &self.lifted_features {
            hasher.update(id.as_bytes());
            hasher.update(features.join(",").as_bytes());
        }
        for (path, assignment) in &self.hierarchy_assignments {
            hasher.update(path.as_bytes());
            hasher.update(assignment.as_bytes());
        }
        let digest = hasher.finalize();
        self.graph_revision = hex_prefix(&digest, 12);
    }

    /// Step 1: discover files, parse, insert placeholder nodes, precompute
    /// batches, and reset all session state.
    pub async fn build_index(
        &mut self,
        project_root: &Path,
        config: &rpg_core::config::DiscoveryConfig,
        store: &mut dyn GraphStore,
    ) -> RpgResult<BuildIndexResult> {
        let (files, warnings) = discovery::discover(project_root, config);
        let mut entities = Vec::new();

        for file in &files {
            let rel = normalize_rel(file);
            let abs = project_root.join(&file.relative_path);
            let Ok(source) = std::fs::read_to_string(&abs) else {
                continue;
            };
            let Some(language) = Language::from_path(&file.relative_path) else {
                continue;
            };
            let parse_result = parse_source(&file.relative_path, &source, language);
            let file_node_id = format!("{rel}:file");

            let mut file_node = Node::new_low_level(
                file_node_id.clone(),
                LowLevelKind::File,
                SemanticFeature::new(format!("file {rel}"), []),
            );
            file_node.metadata = Some(Metadata {
                path: Some(rel.clone()),
                language: Some(language.name().to_string()),
                ..Metadata::default()
            });
            store.add_node(file_node).await?;

            for (i, entity) in parse_result.entities.iter().enumerate() {
                let Some(kind) = entity.kind.to_low_level_kind() else {
                    continue;
                };
                let entity_id = format!("{rel}:{}:{}:{}", entity.kind.as_str(), entity.name, entity.start_line);
                let snippet = extract_snippet(&source, entity.start_line, entity.end_line);

                let mut node = Node::new_low_level(
                    entity_id.clone(),
                    kind,
                    SemanticFeature::new(format!("{} {}", entity.kind.as_str(), entity.name), []),
                );
                node.metadata = Some(Metadata {
                    path: Some(rel.clone()),
                    qualified_name: entity.parent.as_ref().map(|p| format!("{p}.{}", entity.name)),
                    language: Some(language.name().to_string()),
                    start_line: Some(entity.start_line),
                    end_line: Some(entity.end_line),
                    ..Metadata::default()
                });
                store.add_node(node).await?;
                store
                    .add_edge(Edge::Functional(FunctionalEdge {
                        parent: file_node_id.clone(),
                        child: entity_id.clone(),
                        level: None,
                        sibling_order: Some(i),
                    }))
                    .await?;

                entities.push(LiftableEntity {
                    entity_id,
                    file_path: rel.clone(),
                    kind: entity.kind.as_str().to_string(),
                    name: entity.name.clone(),
                    parent: entity.parent.clone(),
                    source_snippet: snippet,
                });
            }
        }

        self.entities = entities;
        self.batch_boundaries = compute_batches(&self.entities);
        self.lifted_features.clear();
        self.file_features.clear();
        self.synthesized_features.clear();
        self.hierarchy_assignments.clear();
        self.pending_routing.clear();
        self.recompute_revision();

        info!(files = files.len(), entities = self.entities.len(), "interactive index built");

        Ok(BuildIndexResult {
            files_discovered: files.len(),
            entities_found: self.entities.len(),
            batch_count: self.batch_boundaries.len(),
            next_action: "get_entity_batch",
            warnings,
        })
    }

    /// Step 2: render one batch of entities, optionally restricted to a
    /// file-path-prefix `scope` ("*" / "all" means every entity).
    pub fn get_entity_batch(&self, scope: &str, batch_index: usize) -> RpgResult<EntityBatchView> {
        let indices = self.scoped_indices(scope);
        let boundaries = if scope == "*" || scope.eq_ignore_ascii_case("all") {
            self.batch_boundaries.clone()
        } else {
            compute_batches(&indices.iter().map(|&i| self.entities[i].clone()).collect::<Vec<_>>())
        };

        let Some(&(start, end)) = boundaries.get(batch_index) else {
            return Err(RpgError::InvalidInput(format!(
                "batch_index {batch_index} out of range (0..{})",
                boundaries.len()
            )));
        };

        let scoped_entities: Vec<&LiftableEntity> = if scope == "*" || scope.eq_ignore_ascii_case("all") {
            self.entities[start..end].iter().collect()
        } else {
            indices[start..end].iter().map(|&i| &self.entities[i]).collect()
        };

        let entities = scoped_entities
            .into_iter()
            .map(|e| RenderedEntity {
                entity_id: e.entity_id.clone(),
                kind: e.kind.clone(),
                name: e.name.clone(),
                parent: e.parent.clone(),
                snippet: truncate(&e.source_snippet, SNIPPET_RENDER_LIMIT),
            })
            .collect();

        Ok(EntityBatchView {
            entities,
            batch_index,
            total_batches: boundaries.len(),
            instructions: if batch_index == 0 { Some(ENTITY_BATCH_INSTRUCTIONS) } else { None },
        })
    }

    fn scoped_indices(&self, scope: &str) -> Vec<usize> {
        if scope == "*" || scope.eq_ignore_ascii_case("all") {
            return (0..self.entities.len()).collect();
        }
        self.entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.file_path.starts_with(scope) || e.entity_id == scope)
            .map(|(i, _)| i)
            .collect()
    }

    /// Step 3: write submitted features into the graph. Unknown entity ids
    /// are a hard error.
    pub async fn submit_features(
        &mut self,
        features: BTreeMap<String, Vec<String>>,
        store: &mut dyn GraphStore,
    ) -> RpgResult<SubmitFeaturesResult> {
        let mut result = SubmitFeaturesResult::default();

        for (entity_id, raw) in features {
            let Some(entity) = self.entities.iter().find(|e| e.entity_id == entity_id) else {
                return Err(RpgError::NodeNotFound(entity_id));
            };

            let cleaned: Vec<String> = raw.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
            let keywords = normalize_keywords(cleaned.iter().flat_map(|f| f.split_whitespace().map(str::to_string)));
            let description = cleaned.join("; ");
            let new_feature = SemanticFeature::new(description, keywords);

            let old_feature = store.get_node(&entity_id).await?.map(|n| n.feature);
            if let Some(old) = &old_feature {
                if !old.keywords.is_empty() && old.jaccard_distance(&new_feature) > DRIFT_THRESHOLD {
                    self.pending_routing.push(PendingRouting {
                        file_node_id: format!("{}:file", entity.file_path),
                        entity_id: entity_id.clone(),
                        features: cleaned.clone(),
                        reason: "drifted".to_string(),
                    });
                    result.drifted.push(entity_id.clone());
                }
            }

            store
                .update_node(&entity_id, NodePatch { feature: Some(new_feature), ..Default::default() })
                .await?;
            self.lifted_features.insert(entity_id, cleaned);
            result.updated += 1;
        }

        self.recompute_revision();
        Ok(result)
    }

    /// Step 4: aggregate each file's feature from its already-lifted
    /// children.
    pub async fn finalize_features(&mut self, store: &mut dyn GraphStore) -> RpgResult<FinalizeResult> {
        let mut by_file: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entity in &self.entities {
            by_file.entry(entity.file_path.clone()).or_default().push(entity.entity_id.clone());
        }

        let mut aggregated = 0;
        for (file_path, entity_ids) in &by_file {
            let file_node_id = format!("{file_path}:file");
            let mut child_features = Vec::new();
            for id in entity_ids {
                if let Some(node) = store.get_node(id).await? {
                    child_features.push(node.feature);
                }
            }
            let feature = aggregate_file_feature(file_path, &child_features);
            store
                .update_node(&file_node_id, NodePatch { feature: Some(feature.clone()), ..Default::default() })
                .await?;
            self.file_features.insert(file_path.clone(), feature);
            aggregated += 1;
        }

        let next_action = if self.hierarchy_assignments.is_empty() { "synthesis" } else { "routing" };
        Ok(FinalizeResult { files_aggregated: aggregated, next_action })
    }

    /// Step 5a: paginate file features awaiting holistic synthesis.
    pub fn get_synthesis_batch(&self, batch_index: usize) -> RpgResult<SynthesisBatchView> {
        let paths: Vec<&String> = self.file_features.keys().collect();
        let boundaries = paginate(paths.len(), BATCH_MAX_ENTITIES);
        let Some(&(start, end)) = boundaries.get(batch_index) else {
            return Err(RpgError::InvalidInput(format!(
                "batch_index {batch_index} out of range (0..{})",
                boundaries.len()
            )));
        };
        let files = paths[start..end]
            .iter()
            .map(|path| {
                let feature = &self.file_features[path.as_str()];
                FileFeatureView {
                    file_path: (*path).clone(),
                    description: feature.description.clone(),
                    keywords: feature.keywords.clone(),
                }
            })
            .collect();
        Ok(SynthesisBatchView { files, batch_index, total_batches: boundaries.len() })
    }

    /// Step 5b: apply a holistic, comma-separated re-write of a file's
    /// feature set.
    pub async fn submit_synthesis(
        &mut self,
        syntheses: BTreeMap<String, String>,
        store: &mut dyn GraphStore,
    ) -> RpgResult<SynthesisResult> {
        let mut updated = 0;
        for (file_path, text) in syntheses {
            let file_node_id = format!("{file_path}:file");
            let keywords = normalize_keywords(text.split(',').map(|s| s.trim().to_string()));
            let feature = SemanticFeature::new(text, keywords);
            store
                .update_node(&file_node_id, NodePatch { feature: Some(feature.clone()), ..Default::default() })
                .await?;
            self.file_features.insert(file_path.clone(), feature.clone());
            self.synthesized_features.insert(file_path, feature);
            updated += 1;
        }
        self.recompute_revision();
        Ok(SynthesisResult { updated })
    }

    /// Step 6a: the file-feature groups an agent should propose a
    /// three-level hierarchy for.
    pub fn get_hierarchy_context(&self) -> HierarchyContextView {
        let pairs: Vec<(String, SemanticFeature)> =
            self.file_features.iter().map(|(p, f)| (p.clone(), f.clone())).collect();
        HierarchyContextView { groups: hierarchy::group_by_top_level_dir(&pairs), instructions: HIERARCHY_INSTRUCTIONS }
    }

    /// Step 6b: build the High-Level spine from submitted `file_path ->
    /// "Area/category/subcategory"` assignments, deduplicating ancestors.
    pub async fn submit_hierarchy(
        &mut self,
        assignments: BTreeMap<String, String>,
        store: &mut dyn GraphStore,
    ) -> RpgResult<HierarchyResult> {
        let mut created = std::collections::BTreeSet::new();
        let mut descendants: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut warnings = Vec::new();

        for (file_path, raw_path) in &assignments {
            let normalized = hierarchy::normalize_hierarchy_path(raw_path);
            let file_node_id = format!("{file_path}:file");
            let leaf = ensure_area_path(store, &normalized, &mut created).await?;
            store
                .add_edge(Edge::Functional(FunctionalEdge {
                    parent: leaf.clone(),
                    child: file_node_id,
                    level: None,
                    sibling_order: None,
                }))
                .await?;
            descendants.entry(leaf).or_default().push(file_path.clone());
            self.hierarchy_assignments.insert(file_path.clone(), normalized);
        }

        for (area_id, paths) in &descendants {
            grounding::propagate_metadata(store, area_id, paths, &mut warnings).await;
        }

        self.recompute_revision();
        Ok(HierarchyResult { areas_created: created.len(), files_routed: assignments.len() })
    }

    /// Step 7a: paginate pending routing candidates, tagged with the
    /// revision a subsequent [`InteractiveSession::submit_routing`] call
    /// must echo back.
    pub fn get_routing_batch(&self, batch_index: usize) -> RpgResult<RoutingBatchView> {
        let boundaries = paginate(self.pending_routing.len(), BATCH_MAX_ENTITIES);
        let (start, end) = *boundaries.get(batch_index).unwrap_or(&(0, 0));
        Ok(RoutingBatchView {
            entries: self.pending_routing[start..end].to_vec(),
            batch_index,
            total_batches: boundaries.len().max(1),
            graph_revision: self.graph_revision.clone(),
        })
    }

    /// Step 7b: apply Keep/Move decisions. The submitted `revision` must
    /// match the session's current [`InteractiveSession::graph_revision`]
    /// or the call fails with [`RpgError::StaleRevision`].
    pub async fn submit_routing(
        &mut self,
        decisions: BTreeMap<String, String>,
        revision: &str,
        store: &mut dyn GraphStore,
    ) -> RpgResult<RoutingResult> {
        if revision != self.graph_revision {
            return Err(RpgError::StaleRevision { expected: self.graph_revision.clone(), got: revision.to_string() });
        }

        let mut applied = 0;
        let mut created = std::collections::BTreeSet::new();
        let mut remaining = Vec::new();

        for entry in std::mem::take(&mut self.pending_routing) {
            let Some(decision) = decisions.get(&entry.entity_id) else {
                remaining.push(entry);
                continue;
            };
            if decision.eq_ignore_ascii_case("keep") {
                applied += 1;
                continue;
            }

            let normalized = hierarchy::normalize_hierarchy_path(decision);
            if let Some(parent) = store.get_parent(&entry.file_node_id).await? {
                store.remove_edge(&parent, &entry.file_node_id, true).await?;
            }
            let leaf = ensure_area_path(store, &normalized, &mut created).await?;
            store
                .add_edge(Edge::Functional(FunctionalEdge {
                    parent: leaf,
                    child: entry.file_node_id.clone(),
                    level: None,
                    sibling_order: None,
                }))
                .await?;
            self.hierarchy_assignments.insert(entry.file_node_id.trim_end_matches(":file").to_string(), normalized);
            applied += 1;
        }

        self.pending_routing = remaining;
        self.recompute_revision();
        Ok(RoutingResult { applied, still_pending: self.pending_routing.len() })
    }
}

/// Ensure the three-level `area:{a}`, `area:{a}/{b}`, `area:{a}/{b}/{c}`
/// chain of High-Level nodes exists, wiring Functional edges between
/// consecutive levels. Returns the leaf node id. Mirrors the encoder
/// pipeline's hierarchy application (rpg-encoder's `apply_hierarchy`) so
/// both paths produce identical High-Level node ids.
async fn ensure_area_path(
    store: &mut dyn GraphStore,
    normalized_path: &str,
    created: &mut std::collections::BTreeSet<String>,
) -> RpgResult<String> {
    let segments: Vec<&str> = normalized_path.split('/').collect();
    let mut prefix = String::new();
    let mut parent: Option<String> = None;
    let mut leaf = String::new();

    for segment in &segments {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(segment);
        let node_id = format!("area:{prefix}");
        if !store.has_node(&node_id).await? {
            let mut node = Node::new_high_level(node_id.clone(), SemanticFeature::new(segment.to_string(), []));
            if let NodePayload::HighLevel(ref mut hl) = node.payload {
                hl.directory_path = Some(prefix.clone());
            }
            store.add_node(node).await?;
            created.insert(node_id.clone());
        }
        if let Some(parent_id) = &parent {
            if !store.get_children(parent_id).await?.contains(&node_id) {
                store
                    .add_edge(Edge::Functional(FunctionalEdge {
                        parent: parent_id.clone(),
                        child: node_id.clone(),
                        level: None,
                        sibling_order: None,
                    }))
                    .await?;
            }
        }
        parent = Some(node_id.clone());
        leaf = node_id;
    }
    Ok(leaf)
}

fn aggregate_file_feature(file_path: &str, child_features: &[SemanticFeature]) -> SemanticFeature {
    if child_features.is_empty() {
        let name = Path::new(file_path).file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        return SemanticFeature::new(format!("file {name}"), []);
    }
    let mut feature = SemanticFeature::new(format!("file with {} entities", child_features.len()), []);
    for child in child_features {
        feature.merge_keywords(child.keywords.clone());
    }
    feature.sub_features = Some(child_features.to_vec());
    feature
}

fn normalize_rel(file: &DiscoveredFile) -> String {
    file.relative_path.to_string_lossy().replace('\\', "/")
}

fn extract_snippet(source: &str, start_line: usize, end_line: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let start = start_line.saturating_sub(1).min(lines.len());
    let end = end_line.min(lines.len());
    if start >= end {
        return String::new();
    }
    lines[start..end].join("\n")
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

fn compute_batches(entities: &[LiftableEntity]) -> Vec<(usize, usize)> {
    let mut boundaries = Vec::new();
    let mut start = 0;
    let mut char_count = 0;
    let mut count = 0;

    for (i, entity) in entities.iter().enumerate() {
        let len = entity.source_snippet.chars().count().min(SNIPPET_RENDER_LIMIT);
        if count > 0 && (char_count + len > BATCH_TOKEN_BUDGET_CHARS || count >= BATCH_MAX_ENTITIES) {
            boundaries.push((start, i));
            start = i;
            char_count = 0;
            count = 0;
        }
        char_count += len;
        count += 1;
    }
    if start < entities.len() || entities.is_empty() {
        boundaries.push((start, entities.len()));
    }
    boundaries
}

fn paginate(len: usize, page_size: usize) -> Vec<(usize, usize)> {
    if len == 0 {
        return vec![(0, 0)];
    }
    let mut pages = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + page_size).min(len);
        pages.push((start, end));
        start = end;
    }
    pages
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect::<String>().chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_core::config::DiscoveryConfig;
    use rpg_core::model::RepositoryConfig;
    use rpg_core::store::memory::MemoryGraphStore;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    fn config() -> rpg_core::config::DiscoveryConfig {
        DiscoveryConfig {
            include: vec!["**/*.ts".into()],
            exclude: vec![],
            max_depth: 10,
            respect_gitignore: false,
            include_source: false,
        }
    }

    #[tokio::test]
    async fn build_index_then_batch_then_submit_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "src/auth.ts", "export function validateToken(t: string): boolean {\n  return t.length > 0;\n}\n");

        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        let mut session = InteractiveSession::new();
        let build_result = session.build_index(root, &config(), &mut store).await.unwrap();
        assert_eq!(build_result.files_discovered, 1);
        assert_eq!(build_result.entities_found, 1);

        let batch = session.get_entity_batch("*", 0).unwrap();
        assert_eq!(batch.entities.len(), 1);
        assert!(batch.instructions.is_some());
        let entity_id = batch.entities[0].entity_id.clone();

        let mut features = BTreeMap::new();
        features.insert(entity_id.clone(), vec!["validate token".to_string(), "return boolean".to_string()]);
        let submit_result = session.submit_features(features, &mut store).await.unwrap();
        assert_eq!(submit_result.updated, 1);
        assert!(submit_result.drifted.is_empty());

        let node = store.get_node(&entity_id).await.unwrap().unwrap();
        assert!(node.feature.keywords.contains(&"validate".to_string()));

        let finalize_result = session.finalize_features(&mut store).await.unwrap();
        assert_eq!(finalize_result.files_aggregated, 1);
        assert_eq!(finalize_result.next_action, "synthesis");
    }

    #[tokio::test]
    async fn submit_features_rejects_unknown_entity() {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        let mut session = InteractiveSession::new();
        let mut features = BTreeMap::new();
        features.insert("does-not-exist".to_string(), vec!["foo".to_string()]);
        let err = session.submit_features(features, &mut store).await.unwrap_err();
        assert!(matches!(err, RpgError::NodeNotFound(_)));
    }

    #[tokio::test]
    async fn large_feature_drift_queues_pending_routing() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "src/auth.ts", "export function validateToken(t: string): boolean {\n  return t.length > 0;\n}\n");

        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        let mut session = InteractiveSession::new();
        session.build_index(root, &config(), &mut store).await.unwrap();
        let entity_id = session.get_entity_batch("*", 0).unwrap().entities[0].entity_id.clone();

        let mut first = BTreeMap::new();
        first.insert(entity_id.clone(), vec!["validate token".to_string(), "check length".to_string()]);
        session.submit_features(first, &mut store).await.unwrap();

        let mut second = BTreeMap::new();
        second.insert(entity_id.clone(), vec!["render widget".to_string(), "paint canvas".to_string()]);
        let result = session.submit_features(second, &mut store).await.unwrap();
        assert_eq!(result.drifted, vec![entity_id]);
        assert_eq!(session.pending_routing().len(), 1);
    }

    #[tokio::test]
    async fn submit_routing_rejects_stale_revision() {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        let mut session = InteractiveSession::new();
        let decisions = BTreeMap::new();
        let err = session.submit_routing(decisions, "not-the-real-revision", &mut store).await.unwrap_err();
        assert!(matches!(err, RpgError::StaleRevision { .. }));
    }

    #[tokio::test]
    async fn submit_hierarchy_builds_three_level_spine() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "src/auth.ts", "export function login() {\n  return true;\n}\n");

        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        let mut session = InteractiveSession::new();
        session.build_index(root, &config(), &mut store).await.unwrap();
        session.finalize_features(&mut store).await.unwrap();

        let mut assignments = BTreeMap::new();
        assignments.insert("src/auth.ts".to_string(), "Security/sessions/login".to_string());
        let result = session.submit_hierarchy(assignments, &mut store).await.unwrap();
        assert_eq!(result.areas_created, 3);

        assert!(store.has_node("area:Security").await.unwrap());
        assert!(store.has_node("area:Security/sessions").await.unwrap());
        assert!(store.has_node("area:Security/sessions/login").await.unwrap());
        let parent = store.get_parent("src/auth.ts:file").await.unwrap();
        assert_eq!(parent, Some("area:Security/sessions/login".to_string()));
    }
}
