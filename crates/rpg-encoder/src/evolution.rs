//! The evolution engine: diff-driven incremental update of an existing RPG
//! from a commit range, at lower cost than a full re-encode.

use crate::llm::LlmCompletion;
use crate::semantic::{ExtractionInput, SemanticExtractor};
use rpg_core::cache::SemanticCache;
use rpg_core::error::{RpgResult, Warning};
use rpg_core::model::{Edge, FunctionalEdge, LowLevelKind, Metadata, Node, NodePayload};
use rpg_core::store::{GraphStore, NodePatch};
use rpg_parser::{parse_source, Language};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// A file-level change between `base_commit` and `HEAD`.
#[derive(Debug, Clone)]
pub enum FileChange {
    Added(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

/// Options controlling one evolution run.
#[derive(Debug, Clone)]
pub struct EvolutionOptions {
    pub drift_threshold: f64,
    pub use_llm: bool,
    pub include_source: bool,
    pub force_regenerate_threshold: f64,
}

impl Default for EvolutionOptions {
    fn default() -> Self {
        Self {
            drift_threshold: 0.3,
            use_llm: false,
            include_source: false,
            force_regenerate_threshold: 0.5,
        }
    }
}

/// Outcome of one evolution run.
#[derive(Debug, Default)]
pub struct EvolutionResult {
    pub inserted: usize,
    pub deleted: usize,
    pub modified: usize,
    pub rerouted: usize,
    pub pruned_nodes: usize,
    pub duration: Duration,
    pub llm_calls: usize,
    pub errors: Vec<Warning>,
    /// Set when re-encoding from scratch would touch a larger fraction of
    /// the graph than the diff.
    pub suggest_full_reencode: bool,
}

/// Diff `base_commit..HEAD` in `project_root` into file-level changes via
/// `git2`. Renames are reported distinctly from a delete+add pair so
/// callers can fold them as they see fit.
pub fn detect_changes(project_root: &Path, base_commit: &str) -> anyhow::Result<Vec<FileChange>> {
    let repo = git2::Repository::open(project_root)?;
    let base_oid = git2::Oid::from_str(base_commit)?;
    let base_tree = repo.find_commit(base_oid)?.tree()?;
    let head_tree = repo.head()?.peel_to_commit()?.tree()?;

    let mut diff_opts = git2::DiffOptions::new();
    let mut diff = repo.diff_tree_to_tree(Some(&base_tree), Some(&head_tree), Some(&mut diff_opts))?;
    let mut find_opts = git2::DiffFindOptions::new();
    find_opts.renames(true);
    diff.find_similar(Some(&mut find_opts))?;

    let mut changes = Vec::new();
    diff.foreach(
        &mut |delta, _| {
            match delta.status() {
                git2::Delta::Added => {
                    if let Some(p) = delta.new_file().path() {
                        changes.push(FileChange::Added(p.to_path_buf()));
                    }
                }
                git2::Delta::Deleted => {
                    if let Some(p) = delta.old_file().path() {
                        changes.push(FileChange::Deleted(p.to_path_buf()));
                    }
                }
                git2::Delta::Modified => {
                    if let Some(p) = delta.new_file().path() {
                        changes.push(FileChange::Modified(p.to_path_buf()));
                    }
                }
                git2::Delta::Renamed => {
                    if let (Some(from), Some(to)) = (delta.old_file().path(), delta.new_file().path()) {
                        changes.push(FileChange::Renamed { from: from.to_path_buf(), to: to.to_path_buf() });
                    }
                }
                _ => {}
            }
            true
        },
        None,
        None,
        None,
    )?;
    Ok(changes)
}

/// Read a file's content as it existed at `commit_oid`, or `None` if the
/// path didn't exist in that tree.
fn blob_at(repo: &git2::Repository, commit_oid: git2::Oid, rel_path: &Path) -> Option<String> {
    let commit = repo.find_commit(commit_oid).ok()?;
    let tree = commit.tree().ok()?;
    let entry = tree.get_path(rel_path).ok()?;
    let object = entry.to_object(repo).ok()?;
    let blob = object.as_blob()?;
    String::from_utf8(blob.content().to_vec()).ok()
}

struct ExtractedEntity {
    entity_id: String,
    kind: String,
    name: String,
    parent: Option<String>,
    start_line: usize,
    end_line: usize,
    source_snippet: String,
}

fn extract_all(rel_path: &Path, source: &str) -> Vec<ExtractedEntity> {
    let Some(language) = Language::from_path(rel_path) else {
        return Vec::new();
    };
    let rel = rel_path.to_string_lossy().replace('\\', "/");
    let result = parse_source(rel_path, source, language);
    let lines: Vec<&str> = source.lines().collect();
    result
        .entities
        .into_iter()
        .filter(|e| e.kind.to_low_level_kind().is_some())
        .map(|e| {
            let entity_id = format!("{rel}:{}:{}:{}", e.kind.as_str(), e.name, e.start_line);
            let start = e.start_line.saturating_sub(1).min(lines.len());
            let end = e.end_line.min(lines.len());
            let snippet = if start < end { lines[start..end].join("\n") } else { String::new() };
            ExtractedEntity {
                entity_id,
                kind: e.kind.as_str().to_string(),
                name: e.name,
                parent: e.parent,
                start_line: e.start_line,
                end_line: e.end_line,
                source_snippet: snippet,
            }
        })
        .collect()
}

/// Run one evolution pass. `project_root` must be a git working tree whose
/// `HEAD` is the target revision; `base_commit` is the RPG's last-encoded
/// commit SHA.
pub struct EvolutionEngine {
    options: EvolutionOptions,
    llm: Option<Arc<dyn LlmCompletion>>,
}

impl EvolutionEngine {
    pub fn new(options: EvolutionOptions) -> Self {
        Self { options, llm: None }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmCompletion>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub async fn evolve(
        &self,
        project_root: &Path,
        base_commit: &str,
        store: &mut dyn GraphStore,
        cache: Option<SemanticCache>,
    ) -> RpgResult<EvolutionResult> {
        let start = Instant::now();
        let mut result = EvolutionResult::default();

        let changes = detect_changes(project_root, base_commit)
            .map_err(|e| rpg_core::error::RpgError::Storage(e.to_string()))?;

        let current_node_count = store.stats().await?.low_level_count.max(1);
        let total_changed_files = changes.len();
        if (total_changed_files as f64) / (current_node_count as f64) > self.options.force_regenerate_threshold {
            result.suggest_full_reencode = true;
        }

        let repo = git2::Repository::open(project_root).map_err(|e| rpg_core::error::RpgError::Storage(e.to_string()))?;
        let base_oid = git2::Oid::from_str(base_commit).map_err(|e| rpg_core::error::RpgError::Storage(e.to_string()))?;

        // Normalize renames into an equivalent delete + add, the simplest
        // sound treatment absent a content-similarity carry-over step.
        let mut deleted_paths = BTreeSet::new();
        let mut added_paths = BTreeSet::new();
        let mut modified_paths = BTreeSet::new();
        for change in &changes {
            match change {
                FileChange::Added(p) => { added_paths.insert(p.clone()); }
                FileChange::Deleted(p) => { deleted_paths.insert(p.clone()); }
                FileChange::Modified(p) => { modified_paths.insert(p.clone()); }
                FileChange::Renamed { from, to } => {
                    deleted_paths.insert(from.clone());
                    added_paths.insert(to.clone());
                }
            }
        }

        let mut extractor = SemanticExtractor::new(cache, if self.options.use_llm { self.llm.clone() } else { None });

        // --- Delete pass ---
        for rel in &deleted_paths {
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            let file_node_id = format!("{rel_str}:file");
            let children = store.get_children(&file_node_id).await.unwrap_or_default();
            for child in &children {
                store.remove_node(child).await?;
                result.deleted += 1;
            }
            if store.has_node(&file_node_id).await? {
                store.remove_node(&file_node_id).await?;
                result.pruned_nodes += 1;
            }
        }

        // --- Modify pass ---
        for rel in &modified_paths {
            let old_source = blob_at(&repo, base_oid, rel);
            let new_abs = project_root.join(rel);
            let new_source = std::fs::read_to_string(&new_abs).ok();
            let (Some(old_source), Some(new_source)) = (old_source, new_source) else {
                continue;
            };

            let old_entities = extract_all(rel, &old_source);
            let new_entities = extract_all(rel, &new_source);
            let old_ids: BTreeMap<String, &ExtractedEntity> =
                old_entities.iter().map(|e| (e.entity_id.clone(), e)).collect();
            let new_ids: BTreeMap<String, &ExtractedEntity> =
                new_entities.iter().map(|e| (e.entity_id.clone(), e)).collect();

            for (id, _) in old_ids.iter().filter(|(id, _)| !new_ids.contains_key(*id)) {
                if store.has_node(id).await? {
                    store.remove_node(id).await?;
                    result.deleted += 1;
                }
            }

            let rel_str = rel.to_string_lossy().replace('\\', "/");
            let file_node_id = format!("{rel_str}:file");
            for (id, entity) in &new_ids {
                if !old_ids.contains_key(id.as_str()) {
                    self.insert_entity(store, &mut extractor, &rel_str, &file_node_id, entity, &mut result).await?;
                    continue;
                }

                let old = old_ids[id.as_str()];
                if old.source_snippet == entity.source_snippet {
                    continue;
                }

                let Some(existing_node) = store.get_node(id).await? else {
                    self.insert_entity(store, &mut extractor, &rel_str, &file_node_id, entity, &mut result).await?;
                    continue;
                };

                let input = ExtractionInput {
                    file_path: &rel_str,
                    kind: &entity.kind,
                    name: &entity.name,
                    parent: entity.parent.as_deref(),
                    source_snippet: &entity.source_snippet,
                    documentation: None,
                };
                let new_feature = extractor.extract(&input, &mut result.errors).await;
                if self.llm.is_some() {
                    result.llm_calls += 1;
                }

                let drift = existing_node.feature.jaccard_distance(&new_feature);
                if drift > self.options.drift_threshold {
                    result.rerouted += 1;
                }
                store
                    .update_node(id, NodePatch { feature: Some(new_feature), ..Default::default() })
                    .await?;
                result.modified += 1;
            }
        }

        // --- Insert pass ---
        for rel in &added_paths {
            let abs = project_root.join(rel);
            let Ok(source) = std::fs::read_to_string(&abs) else { continue };
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            let file_node_id = format!("{rel_str}:file");
            if !store.has_node(&file_node_id).await? {
                let file_node = Node::new_low_level(
                    file_node_id.clone(),
                    LowLevelKind::File,
                    rpg_core::feature::SemanticFeature::new(format!("file {rel_str}"), []),
                );
                store.add_node(file_node).await?;
            }
            for entity in extract_all(rel, &source) {
                self.insert_entity(store, &mut extractor, &rel_str, &file_node_id, &entity, &mut result).await?;
            }
        }

        if let Some(cache) = extractor.cache_mut() {
            let _ = cache.save();
        }

        info!(
            inserted = result.inserted,
            deleted = result.deleted,
            modified = result.modified,
            rerouted = result.rerouted,
            "evolution complete"
        );
        result.duration = start.elapsed();
        Ok(result)
    }

    async fn insert_entity(
        &self,
        store: &mut dyn GraphStore,
        extractor: &mut SemanticExtractor,
        rel_path: &str,
        file_node_id: &str,
        entity: &ExtractedEntity,
        result: &mut EvolutionResult,
    ) -> RpgResult<()> {
        let Some(kind) = low_level_kind_from_str(&entity.kind) else {
            return Ok(());
        };
        let input = ExtractionInput {
            file_path: rel_path,
            kind: &entity.kind,
            name: &entity.name,
            parent: entity.parent.as_deref(),
            source_snippet: &entity.source_snippet,
            documentation: None,
        };
        let feature = extractor.extract(&input, &mut result.errors).await;
        if self.llm.is_some() {
            result.llm_calls += 1;
        }

        let mut node = Node::new_low_level(entity.entity_id.clone(), kind, feature);
        node.metadata = Some(Metadata {
            path: Some(rel_path.to_string()),
            start_line: Some(entity.start_line),
            end_line: Some(entity.end_line),
            ..Metadata::default()
        });
        if self.options.include_source {
            if let NodePayload::LowLevel(ref mut ll) = node.payload {
                ll.source_code = Some(entity.source_snippet.clone());
            }
        }
        store.add_node(node).await?;
        store
            .add_edge(Edge::Functional(FunctionalEdge {
                parent: file_node_id.to_string(),
                child: entity.entity_id.clone(),
                level: None,
                sibling_order: None,
            }))
            .await?;
        result.inserted += 1;
        Ok(())
    }
}

fn low_level_kind_from_str(kind: &str) -> Option<LowLevelKind> {
    match kind {
        "function" => Some(LowLevelKind::Function),
        "class" => Some(LowLevelKind::Class),
        "method" => Some(LowLevelKind::Method),
        _ => None,
    }
}

/// Restore previously-lifted features from an old export onto a freshly
/// built graph by matching node ids — used when a caller rebuilds from
/// scratch but wants to keep interactively-submitted features rather than
/// re-running a full re-lift.
pub fn merge_features(store_nodes: &[Node], old_nodes: &[Node]) -> Vec<(String, rpg_core::feature::SemanticFeature)> {
    let old_by_id: BTreeMap<&str, &Node> = old_nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    store_nodes
        .iter()
        .filter(|n| n.feature.keywords.is_empty())
        .filter_map(|n| old_by_id.get(n.id.as_str()).map(|old| (n.id.clone(), old.feature.clone())))
        .filter(|(_, f)| !f.keywords.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_core::model::RepositoryConfig;
    use rpg_core::store::memory::MemoryGraphStore;
    use std::process::Command;

    fn git(args: &[&str], cwd: &Path) {
        let status = Command::new("git").args(args).current_dir(cwd).status().unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    fn init_repo(root: &Path) {
        git(&["init", "-q"], root);
        git(&["config", "user.email", "test@example.com"], root);
        git(&["config", "user.name", "Test"], root);
    }

    #[tokio::test]
    async fn detects_added_and_deleted_files() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        init_repo(root);

        std::fs::write(root.join("a.ts"), "export function a() {}\nexport function b() {}\n").unwrap();
        git(&["add", "."], root);
        git(&["commit", "-q", "-m", "base"], root);
        let base_commit = String::from_utf8(
            Command::new("git").args(["rev-parse", "HEAD"]).current_dir(root).output().unwrap().stdout,
        )
        .unwrap()
        .trim()
        .to_string();

        std::fs::remove_file(root.join("a.ts")).unwrap();
        std::fs::write(root.join("b.ts"), "export function c() {}\nexport function d() {}\n").unwrap();
        git(&["add", "-A"], root);
        git(&["commit", "-q", "-m", "second"], root);

        let changes = detect_changes(root, &base_commit).unwrap();
        assert!(changes.iter().any(|c| matches!(c, FileChange::Deleted(p) if p == Path::new("a.ts"))));
        assert!(changes.iter().any(|c| matches!(c, FileChange::Added(p) if p == Path::new("b.ts"))));
    }

    #[tokio::test]
    async fn evolve_inserts_and_deletes_entities() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        init_repo(root);

        std::fs::write(root.join("a.ts"), "export function oldFn() {}\n").unwrap();
        git(&["add", "."], root);
        git(&["commit", "-q", "-m", "base"], root);
        let base_commit = String::from_utf8(
            Command::new("git").args(["rev-parse", "HEAD"]).current_dir(root).output().unwrap().stdout,
        )
        .unwrap()
        .trim()
        .to_string();

        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        let old_entity_id = "a.ts:function:oldFn:1".to_string();
        store
            .add_node(Node::new_low_level(
                "a.ts:file",
                LowLevelKind::File,
                rpg_core::feature::SemanticFeature::new("file a.ts", []),
            ))
            .await
            .unwrap();
        store
            .add_node(Node::new_low_level(
                old_entity_id.clone(),
                LowLevelKind::Function,
                rpg_core::feature::SemanticFeature::new("old fn", ["old".to_string()]),
            ))
            .await
            .unwrap();
        store
            .add_edge(Edge::Functional(FunctionalEdge {
                parent: "a.ts:file".to_string(),
                child: old_entity_id,
                level: None,
                sibling_order: Some(0),
            }))
            .await
            .unwrap();

        std::fs::remove_file(root.join("a.ts")).unwrap();
        std::fs::write(root.join("b.ts"), "export function newFnOne() {}\nexport function newFnTwo() {}\n").unwrap();
        git(&["add", "-A"], root);
        git(&["commit", "-q", "-m", "second"], root);

        let engine = EvolutionEngine::new(EvolutionOptions::default());
        let result = engine.evolve(root, &base_commit, &mut store, None).await.unwrap();

        assert_eq!(result.deleted, 1);
        assert_eq!(result.inserted, 2);
        assert_eq!(result.modified, 0);
        assert_eq!(result.rerouted, 0);
        assert!(!store.has_node("a.ts:file").await.unwrap());
    }
}
