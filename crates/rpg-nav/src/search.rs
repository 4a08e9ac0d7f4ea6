//! Search: `mode` picks which fields are matched against,
//! `strategy` picks the underlying retrieval algorithm. `auto` mode runs
//! feature search first and only falls back to snippet search when that
//! comes back empty (a staged fallback, not a merge).

use globset::Glob;
use rpg_core::error::RpgResult;
use rpg_core::store::{GraphStore, TraverseDirection, TraverseEdgeType};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Features,
    Snippets,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    Hybrid,
    Vector,
    Fts,
    String,
}

pub struct SearchParams<'a> {
    pub query: &'a str,
    pub mode: SearchMode,
    pub strategy: SearchStrategy,
    pub file_pattern: Option<&'a str>,
    pub scopes: Option<&'a [String]>,
    pub query_vector: Option<&'a [f32]>,
    pub vector_weight: f64,
    pub limit: usize,
}

impl<'a> SearchParams<'a> {
    pub fn new(query: &'a str, mode: SearchMode, strategy: SearchStrategy) -> Self {
        Self {
            query,
            mode,
            strategy,
            file_pattern: None,
            scopes: None,
            query_vector: None,
            vector_weight: 0.7,
            limit: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub node_id: String,
    pub score: f64,
    pub path: Option<String>,
    pub description: String,
}

/// Run a search against `store`. Never fails on an empty result set; only
/// a malformed glob or an underlying store error propagates.
pub async fn search(store: &dyn GraphStore, params: &SearchParams<'_>) -> RpgResult<Vec<SearchHit>> {
    let mut hits = match params.mode {
        SearchMode::Features => search_features(store, params).await?,
        SearchMode::Snippets => search_snippets(store, params).await?,
        SearchMode::Auto => {
            let feature_hits = search_features(store, params).await?;
            if feature_hits.is_empty() {
                search_snippets(store, params).await?
            } else {
                feature_hits
            }
        }
    };

    if let Some(scopes) = params.scopes {
        let allowed = scoped_ids(store, scopes).await?;
        hits.retain(|h| allowed.contains(&h.node_id));
    }
    if let Some(pattern) = params.file_pattern {
        let matcher = Glob::new(pattern).map_err(|e| rpg_core::error::RpgError::InvalidInput(e.to_string()))?.compile_matcher();
        hits.retain(|h| h.path.as_deref().is_some_and(|p| matcher.is_match(p)));
    }

    dedup_keep_best(&mut hits);
    hits.sort_by(|a, b| {
        b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.node_id.cmp(&b.node_id))
    });
    hits.truncate(params.limit);
    Ok(hits)
}

async fn search_features(store: &dyn GraphStore, params: &SearchParams<'_>) -> RpgResult<Vec<SearchHit>> {
    let scored = store.search_by_feature(params.query, params.scopes).await?;
    to_hits(store, scored).await
}

async fn search_snippets(store: &dyn GraphStore, params: &SearchParams<'_>) -> RpgResult<Vec<SearchHit>> {
    let fetch_limit = params.limit.saturating_mul(2).max(1);
    let scored = match params.strategy {
        SearchStrategy::String => return search_string(store, params).await,
        SearchStrategy::Fts => store.search_hybrid(params.query, None, fetch_limit, 0.0).await?,
        SearchStrategy::Vector => match params.query_vector {
            Some(v) => store.search_vector(v, fetch_limit).await?,
            None => store.search_hybrid(params.query, None, fetch_limit, 0.0).await?,
        },
        SearchStrategy::Hybrid => store.search_hybrid(params.query, params.query_vector, fetch_limit, params.vector_weight).await?,
    };
    to_hits(store, scored).await
}

/// Literal substring scan over node text fields, weighted the way a
/// symbol/path match outranks a description match.
async fn search_string(store: &dyn GraphStore, params: &SearchParams<'_>) -> RpgResult<Vec<SearchHit>> {
    let query_lower = params.query.to_lowercase();
    let terms: Vec<&str> = query_lower.split_whitespace().collect();
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let nodes = store.get_nodes(None).await?;
    let mut hits = Vec::new();
    for node in nodes {
        let qualified = node.qualified_name().unwrap_or("").to_lowercase();
        let path = node.path().unwrap_or("").to_lowercase();
        let description = node.feature.description.to_lowercase();

        let mut score = 0.0;
        for term in &terms {
            if qualified.contains(term) {
                score += 2.0;
            }
            if path.contains(term) {
                score += 1.0;
            }
            if description.contains(term) {
                score += 0.5;
            }
        }
        if score > 0.0 {
            hits.push(SearchHit {
                node_id: node.id.clone(),
                score: score / terms.len() as f64,
                path: node.path().map(str::to_string),
                description: node.feature.description.clone(),
            });
        }
    }
    Ok(hits)
}

async fn to_hits(store: &dyn GraphStore, scored: Vec<rpg_core::store::ScoredNode>) -> RpgResult<Vec<SearchHit>> {
    let mut hits = Vec::with_capacity(scored.len());
    for s in scored {
        let Some(node) = store.get_node(&s.node_id).await? else {
            continue;
        };
        hits.push(SearchHit {
            node_id: s.node_id,
            score: s.score,
            path: node.path().map(str::to_string),
            description: node.feature.description.clone(),
        });
    }
    Ok(hits)
}

async fn scoped_ids(store: &dyn GraphStore, scopes: &[String]) -> RpgResult<HashSet<String>> {
    let mut allowed = HashSet::new();
    for scope in scopes {
        allowed.insert(scope.clone());
        let result = store.traverse(scope, TraverseEdgeType::Functional, TraverseDirection::Out, usize::MAX).await?;
        allowed.extend(result.nodes);
    }
    Ok(allowed)
}

fn dedup_keep_best(hits: &mut Vec<SearchHit>) {
    let mut best: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut deduped: Vec<SearchHit> = Vec::new();
    for hit in hits.drain(..) {
        if let Some(&idx) = best.get(&hit.node_id) {
            if hit.score > deduped[idx].score {
                deduped[idx] = hit;
            }
        } else {
            best.insert(hit.node_id.clone(), deduped.len());
            deduped.push(hit);
        }
    }
    *hits = deduped;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_core::feature::SemanticFeature;
    use rpg_core::model::{LowLevelKind, Metadata, Node, RepositoryConfig};
    use rpg_core::store::memory::MemoryGraphStore;

    async fn seeded_store() -> MemoryGraphStore {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        let mut node = Node::new_low_level(
            "src/auth.ts:function:login:1",
            LowLevelKind::Function,
            SemanticFeature::new("authentication and authorization module", ["auth".to_string(), "login".to_string()]),
        );
        node.metadata = Some(Metadata { path: Some("src/auth.ts".to_string()), ..Metadata::default() });
        store.add_node(node).await.unwrap();

        let mut other = Node::new_low_level(
            "src/ui.ts:function:render:1",
            LowLevelKind::Function,
            SemanticFeature::new("render the widget tree", ["render".to_string(), "widget".to_string()]),
        );
        other.metadata = Some(Metadata { path: Some("src/ui.ts".to_string()), ..Metadata::default() });
        store.add_node(other).await.unwrap();
        store
    }

    #[tokio::test]
    async fn feature_search_matches_description() {
        let store = seeded_store().await;
        let params = SearchParams::new("authentication", SearchMode::Features, SearchStrategy::Fts);
        let hits = search(&store, &params).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node_id, "src/auth.ts:function:login:1");
    }

    #[tokio::test]
    async fn scopes_restrict_results_to_empty() {
        let store = seeded_store().await;
        let mut params = SearchParams::new("authentication", SearchMode::Features, SearchStrategy::Fts);
        let scopes = vec!["other-subtree".to_string()];
        params.scopes = Some(&scopes);
        let hits = search(&store, &params).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn auto_mode_falls_back_to_snippets_when_features_empty() {
        let store = seeded_store().await;
        let params = SearchParams::new("ui.ts", SearchMode::Auto, SearchStrategy::String);
        let hits = search(&store, &params).await.unwrap();
        assert!(hits.iter().any(|h| h.node_id == "src/ui.ts:function:render:1"));
    }
}
