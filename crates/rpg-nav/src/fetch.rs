//! Fetch: resolve a batch of node ids to their source snippet
//! (when available) and their feature-path — the root-to-node chain of
//! descriptions along functional edges, cheapest way for a downstream agent
//! to see "this function lives under Auth > Session > Login" without a
//! second round trip.

use rpg_core::error::RpgResult;
use rpg_core::model::Node;
use rpg_core::store::GraphStore;
use std::collections::HashSet;

/// A single resolved id: its node, source snippet (if any), and the
/// root-to-node description chain.
#[derive(Debug, Clone)]
pub struct FetchedEntity {
    pub node: Node,
    pub source_code: Option<String>,
    pub feature_path: Vec<String>,
}

/// The outcome of a `fetch` call: resolved entities plus any ids that
/// weren't found in the store.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub entities: Vec<FetchedEntity>,
    pub not_found: Vec<String>,
}

/// Resolve `code_entities` and `feature_entities` ids against `store`. At
/// least one of the two slices must be non-empty; callers that violate
/// this get back an empty outcome rather than an error, since the
/// contract's "at least one must be non-empty" is a usage hint, not
/// something the store can itself distinguish from "both legitimately
/// empty".
pub async fn fetch(
    store: &dyn GraphStore,
    code_entities: &[String],
    feature_entities: &[String],
) -> RpgResult<FetchOutcome> {
    let mut seen = HashSet::new();
    let mut outcome = FetchOutcome::default();

    for id in code_entities.iter().chain(feature_entities.iter()) {
        if !seen.insert(id.clone()) {
            continue;
        }
        match store.get_node(id).await? {
            Some(node) => {
                let source_code = node.source_code().map(str::to_string);
                let feature_path = feature_path_for(store, &node).await?;
                outcome.entities.push(FetchedEntity {
                    node,
                    source_code,
                    feature_path,
                });
            }
            None => outcome.not_found.push(id.clone()),
        }
    }

    Ok(outcome)
}

/// Walk functional parents from `node` to the root, collecting descriptions
/// root-first. Each node has at most one functional parent (invariant 3), so
/// this terminates without cycle detection — but we still cap it defensively
/// against a pathological store that violates that invariant.
async fn feature_path_for(store: &dyn GraphStore, node: &Node) -> RpgResult<Vec<String>> {
    let mut chain = vec![node.feature.description.clone()];
    let mut current = node.id.clone();
    let mut visited = HashSet::new();
    visited.insert(current.clone());

    while let Some(parent_id) = store.get_parent(&current).await? {
        if !visited.insert(parent_id.clone()) {
            break;
        }
        let Some(parent) = store.get_node(&parent_id).await? else {
            break;
        };
        chain.push(parent.feature.description.clone());
        current = parent_id;
    }

    chain.reverse();
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_core::feature::SemanticFeature;
    use rpg_core::model::{Edge, FunctionalEdge, LowLevelKind, RepositoryConfig};
    use rpg_core::store::memory::MemoryGraphStore;

    async fn seeded_store() -> MemoryGraphStore {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        store
            .add_node(Node::new_high_level(
                "root",
                SemanticFeature::new("the whole app", []),
            ))
            .await
            .unwrap();

        store
            .add_node(Node::new_high_level(
                "auth",
                SemanticFeature::new("authentication area", []),
            ))
            .await
            .unwrap();

        let mut login = Node::new_low_level(
            "src/auth.ts:function:login:1",
            LowLevelKind::Function,
            SemanticFeature::new("logs a user in", []),
        );
        if let rpg_core::model::NodePayload::LowLevel(ref mut l) = login.payload {
            l.source_code = Some("function login() {}".to_string());
        }
        store.add_node(login).await.unwrap();

        store
            .add_edge(Edge::Functional(FunctionalEdge {
                parent: "root".into(),
                child: "auth".into(),
                level: None,
                sibling_order: Some(0),
            }))
            .await
            .unwrap();
        store
            .add_edge(Edge::Functional(FunctionalEdge {
                parent: "auth".into(),
                child: "src/auth.ts:function:login:1".into(),
                level: None,
                sibling_order: Some(0),
            }))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn fetch_returns_snippet_and_root_to_node_path() {
        let store = seeded_store().await;
        let ids = vec!["src/auth.ts:function:login:1".to_string()];
        let outcome = fetch(&store, &ids, &[]).await.unwrap();
        assert_eq!(outcome.entities.len(), 1);
        assert!(outcome.not_found.is_empty());
        let entity = &outcome.entities[0];
        assert_eq!(entity.source_code.as_deref(), Some("function login() {}"));
        assert_eq!(
            entity.feature_path,
            vec![
                "the whole app".to_string(),
                "authentication area".to_string(),
                "logs a user in".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_ids_are_collected_not_errored() {
        let store = seeded_store().await;
        let ids = vec!["does-not-exist".to_string()];
        let outcome = fetch(&store, &ids, &[]).await.unwrap();
        assert!(outcome.entities.is_empty());
        assert_eq!(outcome.not_found, vec!["does-not-exist".to_string()]);
    }

    #[tokio::test]
    async fn dedup_across_both_arrays() {
        let store = seeded_store().await;
        let code = vec!["auth".to_string()];
        let features = vec!["auth".to_string()];
        let outcome = fetch(&store, &code, &features).await.unwrap();
        assert_eq!(outcome.entities.len(), 1);
    }
}
