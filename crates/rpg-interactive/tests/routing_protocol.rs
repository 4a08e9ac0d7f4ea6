//! Integration coverage for the feature-drift routing round trip: two
//! conflicting feature submissions for the same entity queue a routing
//! candidate, and `submit_routing` enforces the revision check before
//! applying a move decision.

use rpg_core::model::RepositoryConfig;
use rpg_core::store::memory::MemoryGraphStore;
use rpg_core::store::GraphStore;
use rpg_interactive::InteractiveSession;
use std::collections::BTreeMap;
use std::path::Path;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

fn config() -> rpg_core::config::DiscoveryConfig {
    rpg_core::config::DiscoveryConfig {
        include: vec!["**/*.ts".into()],
        exclude: vec![],
        max_depth: 10,
        respect_gitignore: false,
        include_source: false,
    }
}

#[tokio::test]
async fn drifted_feature_queues_routing_then_moves_on_fresh_revision() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "src/widget.ts", "export function render() {\n  return 1;\n}\n");

    let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
    let mut session = InteractiveSession::new();
    session.build_index(root, &config(), &mut store).await.unwrap();

    let entity_id = session.get_entity_batch("*", 0).unwrap().entities[0].entity_id.clone();

    let mut first = BTreeMap::new();
    first.insert(entity_id.clone(), vec!["parse".to_string(), "validate".to_string()]);
    let first_result = session.submit_features(first, &mut store).await.unwrap();
    assert!(first_result.drifted.is_empty());

    let mut second = BTreeMap::new();
    second.insert(entity_id.clone(), vec!["render".to_string(), "compile".to_string()]);
    let second_result = session.submit_features(second, &mut store).await.unwrap();
    assert_eq!(second_result.drifted, vec![entity_id.clone()]);
    assert_eq!(session.pending_routing().len(), 1);
    assert_eq!(session.pending_routing()[0].reason, "drifted");

    let stale_revision = "deadbeefdead".to_string();
    let mut decisions = BTreeMap::new();
    decisions.insert(entity_id.clone(), "Core/ui/render".to_string());
    let stale_err = session.submit_routing(decisions.clone(), &stale_revision, &mut store).await.unwrap_err();
    assert!(matches!(stale_err, rpg_core::error::RpgError::StaleRevision { .. }));
    assert_eq!(session.pending_routing().len(), 1);

    let fresh_revision = session.graph_revision().to_string();
    let routing_result = session.submit_routing(decisions, &fresh_revision, &mut store).await.unwrap();
    assert_eq!(routing_result.applied, 1);
    assert_eq!(routing_result.still_pending, 0);
    assert!(session.pending_routing().is_empty());

    let parent = store.get_parent("src/widget.ts:file").await.unwrap();
    assert_eq!(parent, Some("area:Core/ui/render".to_string()));
}
