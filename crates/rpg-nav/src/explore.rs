//! Explore: the same contract as [`rpg_core::store::GraphStore::traverse`],
//! surfaced as a query-surface operation with its own `NodeNotFound` check —
//! `traverse` itself happily starts from an id that doesn't exist and just
//! returns an empty result, but the query surface must reject that case
//! explicitly.

use rpg_core::error::{RpgError, RpgResult};
use rpg_core::store::{GraphStore, TraversalResult, TraverseDirection, TraverseEdgeType};

/// The outcome of an `explore` call: identical shape to `GraphStore::traverse`.
pub type ExploreResult = TraversalResult;

/// Walk the graph from `start` up to `max_depth`, following `edge_type` edges
/// in `direction`. Fails with [`RpgError::NodeNotFound`] if `start` isn't in
/// the store.
pub async fn explore(
    store: &dyn GraphStore,
    start: &str,
    edge_type: TraverseEdgeType,
    direction: TraverseDirection,
    max_depth: usize,
) -> RpgResult<ExploreResult> {
    if !store.has_node(start).await? {
        return Err(RpgError::NodeNotFound(start.to_string()));
    }
    store.traverse(start, edge_type, direction, max_depth).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_core::feature::SemanticFeature;
    use rpg_core::model::{Edge, FunctionalEdge, LowLevelKind, Node, RepositoryConfig};
    use rpg_core::store::memory::MemoryGraphStore;

    async fn seeded_store() -> MemoryGraphStore {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        for id in ["root", "auth", "api", "login", "logout"] {
            store
                .add_node(Node::new_low_level(
                    id,
                    LowLevelKind::File,
                    SemanticFeature::new(id, []),
                ))
                .await
                .unwrap();
        }
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
                parent: "root".into(),
                child: "api".into(),
                level: None,
                sibling_order: Some(1),
            }))
            .await
            .unwrap();
        store
            .add_edge(Edge::Functional(FunctionalEdge {
                parent: "auth".into(),
                child: "login".into(),
                level: None,
                sibling_order: Some(0),
            }))
            .await
            .unwrap();
        store
            .add_edge(Edge::Functional(FunctionalEdge {
                parent: "auth".into(),
                child: "logout".into(),
                level: None,
                sibling_order: Some(1),
            }))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn s2_explore_root_depth_one() {
        let store = seeded_store().await;
        let result = explore(
            &store,
            "root",
            TraverseEdgeType::Functional,
            TraverseDirection::Out,
            1,
        )
        .await
        .unwrap();
        let mut nodes = result.nodes.clone();
        nodes.sort();
        assert_eq!(nodes, vec!["api".to_string(), "auth".to_string()]);
        assert_eq!(result.max_depth_reached, 1);
    }

    #[tokio::test]
    async fn unknown_start_is_node_not_found() {
        let store = seeded_store().await;
        let err = explore(
            &store,
            "does-not-exist",
            TraverseEdgeType::Functional,
            TraverseDirection::Out,
            1,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RpgError::NodeNotFound(id) if id == "does-not-exist"));
    }
}
