//! The full three-phase encoder pipeline: discovery → Phase 1 (semantic
//! lifting) → Phase 2 (structural reorganization) → Phase 3 (artifact
//! grounding), against a [`GraphStore`].

use crate::discovery;
use crate::grounding::{self, FileImports};
use crate::hierarchy::{self, FileFeatureGroup, HierarchyAssignment};
use crate::llm::LlmCompletion;
use crate::semantic::{ExtractionInput, SemanticExtractor};
use rpg_core::config::RpgConfig;
use rpg_core::error::{RpgResult, Warning};
use rpg_core::feature::SemanticFeature;
use rpg_core::model::{Edge, FunctionalEdge, LowLevelKind, Metadata, Node, NodePayload};
use rpg_core::store::GraphStore;
use rpg_parser::parse_source;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Summary returned by [`EncoderPipeline::encode`]. Always well-formed —
/// a degenerate run (zero files) is a valid, non-error result.
#[derive(Debug, Default)]
pub struct EncodeResult {
    pub files_processed: usize,
    pub low_level_nodes: usize,
    pub high_level_nodes: usize,
    pub dependency_edges: usize,
    pub phase2_skipped: bool,
    pub duration: Duration,
    pub warnings: Vec<Warning>,
}

/// Orchestrates the three-phase encode against a repository root and a
/// caller-supplied [`GraphStore`]. `config.semantic.use_llm` is the single
/// "LLM was requested" switch: unset + no provider skips Phase 2 silently;
/// set + no provider fails the run.
pub struct EncoderPipeline {
    config: RpgConfig,
    llm: Option<Arc<dyn LlmCompletion>>,
}

impl EncoderPipeline {
    pub fn new(config: RpgConfig) -> Self {
        Self { config, llm: None }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmCompletion>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub async fn encode(&self, project_root: &Path, store: &mut dyn GraphStore) -> RpgResult<EncodeResult> {
        let start = Instant::now();
        let mut warnings = Vec::new();

        let (files, discovery_warnings) = discovery::discover(project_root, &self.config.discovery);
        warnings.extend(discovery_warnings);
        info!(files = files.len(), "discovery complete");

        let cache = if self.config.cache.enabled {
            let cache_path = rpg_core::cache::default_cache_path(project_root, &self.config.cache.cache_dir);
            Some(rpg_core::cache::SemanticCache::with_ttl(
                cache_path,
                Duration::from_secs(self.config.cache.ttl_secs),
            ))
        } else {
            None
        };
        let phase1_llm = if self.config.semantic.use_llm { self.llm.clone() } else { None };
        let mut extractor = SemanticExtractor::new(cache, phase1_llm);

        let mut file_features: Vec<(String, SemanticFeature)> = Vec::new();
        let mut file_node_ids: Vec<String> = Vec::new();
        let mut file_imports: Vec<FileImports> = Vec::new();
        let mut low_level_count = 0usize;

        for file in &files {
            let rel = file.relative_path.to_string_lossy().replace('\\', "/");
            let abs = project_root.join(&file.relative_path);
            let source = match std::fs::read_to_string(&abs) {
                Ok(s) => s,
                Err(e) => {
                    warnings.push(
                        Warning::new(rpg_core::error::WarningKind::ParseFailure, e.to_string())
                            .with_context(rel.clone()),
                    );
                    continue;
                }
            };
            let Some(language) = rpg_parser::Language::from_path(&file.relative_path) else {
                continue;
            };
            let parse_result = parse_source(&file.relative_path, &source, language);

            let file_node_id = format!("{rel}:file");
            let mut child_features = Vec::new();

            for entity in &parse_result.entities {
                let Some(kind) = entity.kind.to_low_level_kind() else {
                    continue;
                };
                let entity_id = format!("{}:{}:{}:{}", rel, entity.kind.as_str(), entity.name, entity.start_line);
                let snippet = extract_snippet(&source, entity.start_line, entity.end_line);
                let input = ExtractionInput {
                    file_path: &rel,
                    kind: entity.kind.as_str(),
                    name: &entity.name,
                    parent: entity.parent.as_deref(),
                    source_snippet: &snippet,
                    documentation: None,
                };
                let feature = extractor.extract(&input, &mut warnings).await;
                child_features.push(feature.clone());

                let mut node = Node::new_low_level(entity_id.clone(), kind, feature);
                node.metadata = Some(Metadata {
                    path: Some(rel.clone()),
                    qualified_name: entity.parent.as_ref().map(|p| format!("{p}.{}", entity.name)),
                    language: Some(language.name().to_string()),
                    start_line: Some(entity.start_line),
                    end_line: Some(entity.end_line),
                    ..Metadata::default()
                });
                if self.config.discovery.include_source {
                    if let NodePayload::LowLevel(ref mut ll) = node.payload {
                        ll.source_code = Some(snippet);
                    }
                }
                store.add_node(node).await?;
                store
                    .add_edge(Edge::Functional(FunctionalEdge {
                        parent: file_node_id.clone(),
                        child: entity_id,
                        level: None,
                        sibling_order: Some(low_level_count),
                    }))
                    .await?;
                low_level_count += 1;
            }

            let file_feature = build_file_feature(&rel, &child_features);
            let mut file_node = Node::new_low_level(file_node_id.clone(), LowLevelKind::File, file_feature.clone());
            file_node.metadata = Some(Metadata {
                path: Some(rel.clone()),
                language: Some(language.name().to_string()),
                ..Metadata::default()
            });
            store.add_node(file_node).await?;
            low_level_count += 1;

            file_features.push((rel.clone(), file_feature));
            file_node_ids.push(file_node_id.clone());
            file_imports.push(FileImports {
                file_node_id,
                relative_path: rel,
                imports: parse_result.imports.into_iter().map(|i| i.module).collect(),
            });
        }

        if let Some(cache) = extractor_cache_mut(&mut extractor) {
            if let Err(e) = cache.save() {
                warn!(error = %e, "failed to flush semantic cache");
            }
        }

        let mut phase2_skipped = false;
        let mut high_level_count = 0usize;
        match (&self.llm, self.config.semantic.use_llm) {
            (Some(llm), true) => {
                high_level_count = self
                    .run_phase2(store, llm.as_ref(), &file_features, &file_node_ids, &mut warnings)
                    .await?;
            }
            (None, true) => return Err(rpg_core::error::RpgError::LlmUnavailable),
            _ => phase2_skipped = true,
        }

        let injected = grounding::inject_dependencies(store, &file_imports, &mut warnings).await;

        Ok(EncodeResult {
            files_processed: files.len(),
            low_level_nodes: low_level_count,
            high_level_nodes: high_level_count,
            dependency_edges: injected,
            phase2_skipped,
            duration: start.elapsed(),
            warnings,
        })
    }

    async fn run_phase2(
        &self,
        store: &mut dyn GraphStore,
        llm: &dyn LlmCompletion,
        file_features: &[(String, SemanticFeature)],
        file_node_ids: &[String],
        warnings: &mut Vec<Warning>,
    ) -> RpgResult<usize> {
        let groups: Vec<FileFeatureGroup> = hierarchy::group_by_top_level_dir(file_features);
        let areas = hierarchy::discover_domains(llm, &groups, Duration::from_secs(30))
            .await
            .unwrap_or_else(|e| {
                warnings.push(Warning::new(rpg_core::error::WarningKind::LlmTimeout, e.to_string()));
                Vec::new()
            });
        let assignments = hierarchy::assign_areas(&groups, &areas);
        hierarchy::log_summary(&assignments);

        let file_id_by_path: BTreeMap<&str, &str> = file_features
            .iter()
            .zip(file_node_ids.iter())
            .map(|((path, _), id)| (path.as_str(), id.as_str()))
            .collect();

        self.apply_hierarchy(store, &assignments, &file_id_by_path, warnings).await
    }

    async fn apply_hierarchy(
        &self,
        store: &mut dyn GraphStore,
        assignments: &[HierarchyAssignment],
        file_id_by_path: &BTreeMap<&str, &str>,
        warnings: &mut Vec<Warning>,
    ) -> RpgResult<usize> {
        let mut created: BTreeMap<String, ()> = BTreeMap::new();
        let mut descendants: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for assignment in assignments {
            let Some(file_id) = file_id_by_path.get(assignment.file_path.as_str()) else {
                continue;
            };
            let segments: Vec<&str> = assignment.path.split('/').collect();
            let mut prefix = String::new();
            let mut parent: Option<String> = None;
            for (i, segment) in segments.iter().enumerate() {
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(segment);
                let node_id = format!("area:{prefix}");
                if created.insert(node_id.clone(), ()).is_none() {
                    let mut node = Node::new_high_level(node_id.clone(), SemanticFeature::new(segment.to_string(), []));
                    if let NodePayload::HighLevel(ref mut hl) = node.payload {
                        hl.directory_path = Some(prefix.clone());
                    }
                    store.add_node(node).await?;
                }
                if let Some(parent_id) = &parent {
                    store
                        .add_edge(Edge::Functional(FunctionalEdge {
                            parent: parent_id.clone(),
                            child: node_id.clone(),
                            level: Some(i),
                            sibling_order: None,
                        }))
                        .await?;
                }
                parent = Some(node_id.clone());
                if i == segments.len() - 1 {
                    store
                        .add_edge(Edge::Functional(FunctionalEdge {
                            parent: node_id.clone(),
                            child: file_id.to_string(),
                            level: None,
                            sibling_order: None,
                        }))
                        .await?;
                    descendants.entry(node_id).or_default().push(assignment.file_path.clone());
                }
            }
        }

        for (high_level_id, paths) in &descendants {
            grounding::propagate_metadata(store, high_level_id, paths, warnings).await;
        }

        Ok(created.len())
    }
}

fn extractor_cache_mut(extractor: &mut SemanticExtractor) -> Option<&mut rpg_core::cache::SemanticCache> {
    extractor.cache_mut()
}

/// Aggregate a file-level feature from its direct children's features,
/// falling back to a name-derived feature when the file has no liftable
/// children.
fn build_file_feature(rel_path: &str, child_features: &[SemanticFeature]) -> SemanticFeature {
    if child_features.is_empty() {
        let name = Path::new(rel_path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| rel_path.to_string());
        return SemanticFeature::new(format!("file {name}"), crate::semantic::split_identifier(&name));
    }
    let description = format!("file with {} entities", child_features.len());
    let mut feature = SemanticFeature::new(description, []);
    for child in child_features {
        feature.merge_keywords(child.keywords.clone());
    }
    feature.sub_features = Some(child_features.to_vec());
    feature
}

fn extract_snippet(source: &str, start_line: usize, end_line: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let start = start_line.saturating_sub(1).min(lines.len());
    let end = end_line.min(lines.len());
    if start >= end {
        return String::new();
    }
    let snippet = lines[start..end].join("\n");
    if snippet.len() > 3000 {
        snippet.chars().take(3000).collect()
    } else {
        snippet
    }
}
