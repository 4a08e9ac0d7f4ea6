//! Integration coverage for the full encode pipeline and the evolution
//! engine operating together against a [`MemoryGraphStore`].

use rpg_core::config::{DiscoveryConfig, RpgConfig};
use rpg_core::model::RepositoryConfig;
use rpg_core::store::memory::MemoryGraphStore;
use rpg_core::store::{EdgeFilter, GraphStore};
use rpg_encoder::evolution::{EvolutionEngine, EvolutionOptions};
use rpg_encoder::pipeline::EncoderPipeline;
use std::path::Path;
use std::process::Command;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

fn no_llm_config() -> RpgConfig {
    let mut config = RpgConfig::default();
    config.semantic.use_llm = false;
    config.cache.enabled = false;
    config.discovery = DiscoveryConfig {
        include: vec!["**/*.ts".into()],
        exclude: vec![],
        max_depth: 10,
        respect_gitignore: false,
        include_source: false,
    };
    config
}

/// Two-file TypeScript repo: `src/utils.ts` imports `src/main.ts`. After a
/// full encode, both file nodes and their entities exist and a single
/// `import` dependency edge points from the importer to the imported file.
#[tokio::test]
async fn encode_emits_file_nodes_and_import_dependency_edge() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();

    write(
        root,
        "src/main.ts",
        "export function greet(name: string): string {\n  return `hi ${name}`;\n}\n\nexport function add(a: number, b: number): number {\n  return a + b;\n}\n",
    );
    write(
        root,
        "src/utils.ts",
        "import { greet } from \"./main\";\n\nexport class Logger {\n  announce(name: string) {\n    return greet(name);\n  }\n}\n",
    );

    let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
    let pipeline = EncoderPipeline::new(no_llm_config());
    let result = pipeline.encode(root, &mut store).await.unwrap();

    assert_eq!(result.files_processed, 2);
    assert!(result.phase2_skipped);

    for id in [
        "src/main.ts:file",
        "src/utils.ts:file",
        "src/main.ts:function:greet:1",
        "src/main.ts:function:add:5",
        "src/utils.ts:class:Logger:3",
    ] {
        assert!(store.has_node(id).await.unwrap(), "missing node {id}");
    }

    let edges = store
        .get_edges(Some(EdgeFilter { functional_only: false, dependency_only: true, dependency_type: None }))
        .await
        .unwrap();
    let import_edges: Vec<_> = edges
        .iter()
        .filter_map(|e| match e {
            rpg_core::model::Edge::Dependency(d) => Some(d),
            _ => None,
        })
        .collect();
    assert_eq!(import_edges.len(), 1);
    assert_eq!(import_edges[0].source, "src/utils.ts:file");
    assert_eq!(import_edges[0].target, "src/main.ts:file");

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.data_flow_edge_count, 1);
}

fn git(args: &[&str], cwd: &Path) {
    let status = Command::new("git").args(args).current_dir(cwd).status().unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// Encode a repo, then mutate it (delete one function, add two) and run
/// the evolution engine: the result counts must match exactly, and the
/// graph must remain internally consistent (no dangling edges).
#[tokio::test]
async fn evolve_after_encode_matches_delete_and_insert_counts() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    git(&["init", "-q"], root);
    git(&["config", "user.email", "test@example.com"], root);
    git(&["config", "user.name", "Test"], root);

    write(
        root,
        "src/main.ts",
        "export function oldHelper() {\n  return 1;\n}\n\nexport function keepMe() {\n  return 2;\n}\n",
    );
    git(&["add", "."], root);
    git(&["commit", "-q", "-m", "base"], root);
    let base_commit =
        String::from_utf8(Command::new("git").args(["rev-parse", "HEAD"]).current_dir(root).output().unwrap().stdout)
            .unwrap()
            .trim()
            .to_string();

    let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
    let pipeline = EncoderPipeline::new(no_llm_config());
    pipeline.encode(root, &mut store).await.unwrap();
    assert!(store.has_node("src/main.ts:function:oldHelper:1").await.unwrap());

    write(
        root,
        "src/main.ts",
        "export function keepMe() {\n  return 2;\n}\n\nexport function freshOne() {\n  return 3;\n}\n\nexport function freshTwo() {\n  return 4;\n}\n",
    );
    git(&["add", "-A"], root);
    git(&["commit", "-q", "-m", "second"], root);

    let engine = EvolutionEngine::new(EvolutionOptions::default());
    let result = engine.evolve(root, &base_commit, &mut store, None).await.unwrap();

    assert_eq!(result.deleted, 1);
    assert_eq!(result.inserted, 2);
    assert_eq!(result.modified, 0);
    assert_eq!(result.rerouted, 0);

    assert!(!store.has_node("src/main.ts:function:oldHelper:1").await.unwrap());
    assert!(store.has_node("src/main.ts:function:keepMe:1").await.unwrap());

    // Every edge's endpoints must still resolve after the mutation.
    let edges = store.get_edges(None).await.unwrap();
    for edge in edges {
        let (source, target) = edge.endpoints();
        assert!(store.has_node(source).await.unwrap(), "dangling edge source {source}");
        assert!(store.has_node(target).await.unwrap(), "dangling edge target {target}");
    }
}
