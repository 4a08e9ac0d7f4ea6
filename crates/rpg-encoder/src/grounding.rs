//! Phase 3 — artifact grounding.
//!
//! Three independent steps, each failure-isolated into warnings rather
//! than aborting the run: LCA-based metadata propagation onto High-Level
//! nodes, import-string dependency resolution, and data-flow edge
//! emission for resolved imports.

use rpg_core::error::{Warning, WarningKind};
use rpg_core::lca::compute_lca;
use rpg_core::model::{DataFlowEdge, DependencyEdge, DependencyType, Edge, Metadata};
use rpg_core::store::GraphStore;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

/// One file's parsed imports, scoped to its own file-node id — enough for
/// dependency injection without re-parsing.
pub struct FileImports {
    pub file_node_id: String,
    pub relative_path: String,
    pub imports: Vec<String>,
}

/// Step 1: compute and store the LCA directory set for every High-Level
/// node, keyed by the paths of its descendant file nodes.
pub async fn propagate_metadata(
    store: &mut dyn GraphStore,
    high_level_id: &str,
    descendant_file_paths: &[String],
    warnings: &mut Vec<Warning>,
) {
    if descendant_file_paths.is_empty() {
        return;
    }
    let paths: Vec<PathBuf> = descendant_file_paths.iter().map(PathBuf::from).collect();
    let lca_dirs = compute_lca(&paths);

    let mut extra = BTreeMap::new();
    extra.insert(
        "paths".to_string(),
        Value::Array(
            lca_dirs
                .iter()
                .map(|p| Value::String(p.to_string_lossy().to_string()))
                .collect(),
        ),
    );

    let metadata = Metadata {
        entity_type: Some("module".to_string()),
        path: lca_dirs.first().map(|p| p.to_string_lossy().to_string()),
        extra,
        ..Metadata::default()
    };

    let patch = rpg_core::store::NodePatch {
        metadata: Some(metadata),
        ..Default::default()
    };
    if let Err(e) = store.update_node(high_level_id, patch).await {
        warnings.push(
            Warning::new(WarningKind::GroundingFailure, e.to_string())
                .with_context(high_level_id.to_string()),
        );
    }
}

/// Candidate extensions tried, in order, when resolving a bare import
/// string to a known file id.
const CANDIDATE_EXTENSIONS: &[&str] = &["", ".ts", ".tsx", ".js", ".jsx", ".py"];

/// Resolve a `./`/`../`-relative import against the directory of the file
/// that imports it; bare specifiers (no leading dot) are assumed already
/// root-relative (local path aliases), anything else is an external
/// package and is left untouched for the caller to fail to resolve.
fn join_relative(importer_path: &str, import_module: &str) -> String {
    if !(import_module.starts_with("./") || import_module.starts_with("../")) {
        return import_module.trim_start_matches('/').to_string();
    }
    let importer_dir = std::path::Path::new(importer_path).parent().unwrap_or_else(|| std::path::Path::new(""));
    let mut parts: Vec<&str> = importer_dir
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    for segment in import_module.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Resolve one import string against the set of known file ids, trying
/// direct match, extension-candidate expansion, then `/index.<ext>`
/// variants. Returns `None` when no candidate matches.
pub fn resolve_import(
    import_module: &str,
    importer_path: &str,
    known_file_ids: &std::collections::HashSet<String>,
) -> Option<String> {
    let normalized = join_relative(importer_path, import_module);

    for ext in CANDIDATE_EXTENSIONS {
        let candidate = format!("{normalized}{ext}:file");
        if known_file_ids.contains(&candidate) {
            return Some(candidate);
        }
    }
    for ext in CANDIDATE_EXTENSIONS {
        if ext.is_empty() {
            continue;
        }
        let candidate = format!("{normalized}/index{ext}:file");
        if known_file_ids.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Step 2 + 3: for every file's imports, resolve the import string to a
/// known file id and emit a deduplicated `import` dependency edge plus a
/// matching data-flow edge. Self-imports are dropped.
pub async fn inject_dependencies(
    store: &mut dyn GraphStore,
    files: &[FileImports],
    warnings: &mut Vec<Warning>,
) -> usize {
    let known_file_ids: std::collections::HashSet<String> =
        files.iter().map(|f| f.file_node_id.clone()).collect();

    let mut seen_edges = std::collections::HashSet::new();
    let mut injected = 0;

    for file in files {
        for import in &file.imports {
            let Some(target) = resolve_import(import, &file.relative_path, &known_file_ids) else {
                continue;
            };
            if target == file.file_node_id {
                continue;
            }
            let edge_key = (file.file_node_id.clone(), target.clone());
            if !seen_edges.insert(edge_key) {
                continue;
            }

            let dep_edge = Edge::Dependency(DependencyEdge {
                source: file.file_node_id.clone(),
                target: target.clone(),
                dependency_type: DependencyType::Import,
                is_runtime: None,
                line: None,
                weight: None,
            });
            if let Err(e) = store.add_edge(dep_edge).await {
                warn!(source = %file.file_node_id, target = %target, error = %e, "failed to add dependency edge");
                warnings.push(
                    Warning::new(WarningKind::DependencyInjectionFailure, e.to_string())
                        .with_context(format!("{} -> {}", file.file_node_id, target)),
                );
                continue;
            }

            if let Err(e) = emit_data_flow_edge(store, &file.file_node_id, &target, import).await {
                warnings.push(
                    Warning::new(WarningKind::DataFlowDetectionFailure, e.to_string())
                        .with_context(format!("{} -> {}", file.file_node_id, target)),
                );
                continue;
            }
            injected += 1;
        }
    }

    injected
}

async fn emit_data_flow_edge(
    store: &mut dyn GraphStore,
    from: &str,
    to: &str,
    import_module: &str,
) -> rpg_core::error::RpgResult<()> {
    let envelope_update = DataFlowEdge {
        from: from.to_string(),
        to: to.to_string(),
        data_id: import_module.to_string(),
        data_type: "import".to_string(),
    };
    store.add_data_flow_edge(envelope_update).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn resolves_direct_and_extension_candidates() {
        let mut known = HashSet::new();
        known.insert("src/utils.ts:file".to_string());
        assert_eq!(
            resolve_import("src/utils", "src/main.ts", &known),
            Some("src/utils.ts:file".to_string())
        );
        assert_eq!(
            resolve_import("src/utils.ts", "src/main.ts", &known),
            Some("src/utils.ts:file".to_string())
        );
    }

    #[test]
    fn resolves_relative_import_against_importer_directory() {
        let mut known = HashSet::new();
        known.insert("src/main.ts:file".to_string());
        assert_eq!(
            resolve_import("./main", "src/utils.ts", &known),
            Some("src/main.ts:file".to_string())
        );
    }

    #[test]
    fn resolves_index_variants() {
        let mut known = HashSet::new();
        known.insert("src/auth/index.ts:file".to_string());
        assert_eq!(
            resolve_import("src/auth", "src/main.ts", &known),
            Some("src/auth/index.ts:file".to_string())
        );
    }

    #[test]
    fn unresolvable_import_returns_none() {
        let known = HashSet::new();
        assert_eq!(resolve_import("some-external-package", "src/main.ts", &known), None);
    }
}
