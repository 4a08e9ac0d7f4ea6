use rpg_core::model::{FunctionalEdge, LowLevelKind, RepositoryConfig};
use rpg_core::schema::GraphEnvelope;
use rpg_core::store::{GraphStore, MemoryGraphStore};
use rpg_core::{storage, Node, SemanticFeature};
use tempfile::TempDir;

fn low_level(id: &str, desc: &str) -> Node {
    Node::new_low_level(id, LowLevelKind::Function, SemanticFeature::new(desc, []))
}

#[test]
fn rpg_dir_and_file_paths() {
    let root = std::path::PathBuf::from("/project");
    assert_eq!(storage::rpg_dir(&root), std::path::PathBuf::from("/project/.rpg"));
    assert_eq!(
        storage::rpg_file(&root),
        std::path::PathBuf::from("/project/.rpg/graph.json")
    );
}

#[test]
fn rpg_exists_false_for_fresh_dir() {
    let tmp = TempDir::new().unwrap();
    assert!(!storage::rpg_exists(tmp.path()));
}

#[tokio::test]
async fn save_and_load_envelope_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    let mut store = MemoryGraphStore::open_memory(RepositoryConfig {
        name: "demo".into(),
        ..Default::default()
    });
    store.add_node(low_level("f.rs:main", "entry point")).await.unwrap();
    let envelope = store.export().await.unwrap();

    storage::save(root, &envelope).unwrap();
    assert!(storage::rpg_exists(root));

    let loaded = storage::load(root).unwrap();
    assert_eq!(loaded.nodes.len(), 1);
    assert_eq!(loaded.config.name, "demo");
    assert!(root.join(".rpg/.gitignore").exists());
}

#[test]
fn backup_is_none_before_first_save() {
    let tmp = TempDir::new().unwrap();
    assert!(storage::create_backup(tmp.path()).unwrap().is_none());
}

#[test]
fn backup_copies_existing_graph_before_overwrite() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let envelope = GraphEnvelope::new(RepositoryConfig::default());
    storage::save(root, &envelope).unwrap();

    let backup = storage::create_backup(root).unwrap().unwrap();
    assert!(backup.exists());
    assert_eq!(backup.file_name().unwrap(), "graph.backup.json");
}

#[tokio::test]
async fn open_path_reloads_previously_saved_graph() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join(".rpg").join("graph.json");

    {
        let mut store = MemoryGraphStore::open_path(path.clone(), RepositoryConfig::default()).unwrap();
        store.add_node(low_level("area", "area")).await.unwrap();
        store
            .add_node(Node::new_high_level("root", SemanticFeature::new("root", [])))
            .await
            .unwrap();
        store
            .add_edge(rpg_core::model::Edge::Functional(FunctionalEdge {
                parent: "root".into(),
                child: "area".into(),
                level: Some(1),
                sibling_order: Some(0),
            }))
            .await
            .unwrap();
        store.close().await.unwrap();
    }

    let reopened = MemoryGraphStore::open_path(path, RepositoryConfig::default()).unwrap();
    assert_eq!(reopened.get_parent("area").await.unwrap(), Some("root".to_string()));
}
