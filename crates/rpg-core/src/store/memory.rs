//! The in-memory (and optionally file-backed) [`GraphStore`] conformance
//! implementation: an arena keyed by node id, edges stored by endpoint id
//! (never by reference, per Design Note §9's cyclic-reference guidance).

use super::{
    EdgeFilter, GraphStats, GraphStore, NodeFilter, NodePatch, ScoredNode, TraverseDirection,
    TraverseEdgeType, TraversalResult,
};
use crate::error::{RpgError, RpgResult};
use crate::model::{
    DependencyEdge, Edge, FunctionalEdge, Node, NodeId, NodePayload, NodeVariant, RepositoryConfig,
};
use crate::schema::GraphEnvelope;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use super::text_index::{tokenize, TextIndex};
use super::vector_index::{reciprocal_rank_fusion, VectorIndex};

/// In-memory arena-backed Graph Store. `path` distinguishes `open("memory")`
/// (no path — `close()` is a no-op) from a file-backed session (`close()`
/// persists via [`crate::storage`]).
pub struct MemoryGraphStore {
    config: RepositoryConfig,
    path: Option<PathBuf>,

    nodes: HashMap<NodeId, Node>,
    node_order: HashMap<NodeId, u64>,
    next_seq: u64,

    edges: Vec<Edge>,
    data_flow_edges: Vec<crate::model::DataFlowEdge>,
    out_index: HashMap<NodeId, Vec<usize>>,
    in_index: HashMap<NodeId, Vec<usize>>,
    functional_parent: HashMap<NodeId, NodeId>,

    feature_index: TextIndex,
    full_index: TextIndex,
    vector_index: VectorIndex,
}

impl MemoryGraphStore {
    /// Open a purely in-memory store.
    pub fn open_memory(config: RepositoryConfig) -> Self {
        Self {
            config,
            path: None,
            nodes: HashMap::new(),
            node_order: HashMap::new(),
            next_seq: 0,
            edges: Vec::new(),
            data_flow_edges: Vec::new(),
            out_index: HashMap::new(),
            in_index: HashMap::new(),
            functional_parent: HashMap::new(),
            feature_index: TextIndex::new(),
            full_index: TextIndex::new(),
            vector_index: VectorIndex::new(),
        }
    }

    /// Open a store backed by `path`: loads an existing envelope if present,
    /// otherwise starts empty. `close()` persists back to `path`.
    pub fn open_path(path: PathBuf, config: RepositoryConfig) -> RpgResult<Self> {
        let mut store = Self::open_memory(config);
        store.path = Some(path.clone());
        if let Ok(envelope) = crate::storage::load_envelope(&path) {
            // Mirrors `GraphStore::import`'s body; duplicated because this
            // runs from a sync constructor rather than the async trait method.
            store.config = envelope.config;
            for node in envelope.nodes {
                let seq = store.next_seq();
                store.node_order.insert(node.id.clone(), seq);
                store.index_node(&node);
                store.nodes.insert(node.id.clone(), node);
            }
            for edge in envelope.edges {
                store.index_edge_unchecked(edge);
            }
            store.data_flow_edges = envelope.data_flow_edges;
        }
        Ok(store)
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn doc_fields(node: &Node) -> Vec<String> {
        let mut fields = vec![node.feature.description.clone(), node.feature.keywords.join(" ")];
        if let Some(p) = node.path() {
            fields.push(p.to_string());
        }
        if let Some(q) = node.qualified_name() {
            fields.push(q.to_string());
        }
        fields
    }

    fn index_node(&mut self, node: &Node) {
        self.feature_index.index(
            &node.id,
            &[node.feature.description.as_str(), &node.feature.keywords.join(" ")],
        );
        let fields = Self::doc_fields(node);
        let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
        self.full_index.index(&node.id, &refs);
    }

    fn index_edge_unchecked(&mut self, edge: Edge) {
        let idx = self.edges.len();
        let (src, dst) = {
            let (s, d) = edge.endpoints();
            (s.to_string(), d.to_string())
        };
        if let Edge::Functional(ref f) = edge {
            self.functional_parent.insert(f.child.clone(), f.parent.clone());
        }
        self.out_index.entry(src).or_default().push(idx);
        self.in_index.entry(dst).or_default().push(idx);
        self.edges.push(edge);
    }

    fn node_seq(&self, id: &str) -> u64 {
        self.node_order.get(id).copied().unwrap_or(u64::MAX)
    }

    /// BFS over functional edges starting at `scope`, collecting the whole
    /// subtree (scope included).
    fn functional_subtree(&self, scope: &str) -> HashSet<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(scope.to_string());
        queue.push_back(scope.to_string());
        while let Some(current) = queue.pop_front() {
            if let Some(idxs) = self.out_index.get(&current) {
                for &idx in idxs {
                    if let Edge::Functional(f) = &self.edges[idx] {
                        if visited.insert(f.child.clone()) {
                            queue.push_back(f.child.clone());
                        }
                    }
                }
            }
        }
        visited
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn add_node(&mut self, node: Node) -> RpgResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(RpgError::DuplicateNode(node.id));
        }
        let seq = self.next_seq();
        self.node_order.insert(node.id.clone(), seq);
        self.index_node(&node);
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    async fn get_node(&self, id: &str) -> RpgResult<Option<Node>> {
        Ok(self.nodes.get(id).cloned())
    }

    async fn has_node(&self, id: &str) -> RpgResult<bool> {
        Ok(self.nodes.contains_key(id))
    }

    async fn update_node(&mut self, id: &str, patch: NodePatch) -> RpgResult<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| RpgError::NodeNotFound(id.to_string()))?;

        if let Some(feature) = patch.feature {
            if !feature.description.is_empty() {
                node.feature.description = feature.description;
            }
            node.feature.merge_keywords(feature.keywords);
            if feature.sub_features.is_some() {
                node.feature.sub_features = feature.sub_features;
            }
        }
        if let Some(metadata) = patch.metadata {
            let target = node.metadata.get_or_insert_with(Default::default);
            if metadata.entity_type.is_some() {
                target.entity_type = metadata.entity_type;
            }
            if metadata.path.is_some() {
                target.path = metadata.path;
            }
            if metadata.qualified_name.is_some() {
                target.qualified_name = metadata.qualified_name;
            }
            if metadata.language.is_some() {
                target.language = metadata.language;
            }
            if metadata.start_line.is_some() {
                target.start_line = metadata.start_line;
            }
            if metadata.end_line.is_some() {
                target.end_line = metadata.end_line;
            }
            target.extra.extend(metadata.extra);
        }
        if let Some(source) = patch.source_code {
            if let NodePayload::LowLevel(ref mut l) = node.payload {
                l.source_code = Some(source);
            }
        }

        let node_snapshot = self.nodes.get(id).unwrap().clone();
        self.index_node(&node_snapshot);
        Ok(())
    }

    async fn remove_node(&mut self, id: &str) -> RpgResult<()> {
        if self.nodes.remove(id).is_none() {
            return Err(RpgError::NodeNotFound(id.to_string()));
        }
        self.feature_index.remove(id);
        self.full_index.remove(id);
        self.vector_index.remove(id);
        self.node_order.remove(id);

        let keep: Vec<Edge> = self
            .edges
            .drain(..)
            .filter(|e| {
                let (s, t) = e.endpoints();
                s != id && t != id
            })
            .collect();
        self.data_flow_edges.retain(|e| e.from != id && e.to != id);
        self.functional_parent.retain(|child, parent| child != id && parent != id);
        self.out_index.clear();
        self.in_index.clear();
        self.edges.clear();
        for edge in keep {
            self.index_edge_unchecked(edge);
        }
        Ok(())
    }

    async fn get_nodes(&self, filter: Option<NodeFilter>) -> RpgResult<Vec<Node>> {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        if let Some(filter) = filter {
            nodes.retain(|n| {
                if let Some(variant) = filter.variant {
                    if n.variant() != variant {
                        return false;
                    }
                }
                if let Some(ref entity_type) = filter.entity_type {
                    let matches = n
                        .metadata
                        .as_ref()
                        .and_then(|m| m.entity_type.as_deref())
                        == Some(entity_type.as_str());
                    if !matches {
                        return false;
                    }
                }
                if let Some(ref prefix) = filter.path_prefix {
                    if !n.path().is_some_and(|p| p.starts_with(prefix.as_str())) {
                        return false;
                    }
                }
                true
            });
        }
        nodes.sort_by_key(|n| self.node_seq(&n.id));
        Ok(nodes.into_iter().cloned().collect())
    }

    async fn add_edge(&mut self, edge: Edge) -> RpgResult<()> {
        let (source, target) = {
            let (s, t) = edge.endpoints();
            (s.to_string(), t.to_string())
        };
        if !self.nodes.contains_key(&source) {
            return Err(RpgError::DanglingReference(source));
        }
        if !self.nodes.contains_key(&target) {
            return Err(RpgError::DanglingReference(target));
        }
        if let Edge::Functional(ref f) = edge {
            if let Some(existing) = self.functional_parent.get(&f.child) {
                if existing != &f.parent {
                    return Err(RpgError::InvalidInput(format!(
                        "node {} already has a functional parent {} (invariant 3: forest)",
                        f.child, existing
                    )));
                }
            }
        }
        self.index_edge_unchecked(edge);
        Ok(())
    }

    async fn add_data_flow_edge(&mut self, edge: crate::model::DataFlowEdge) -> RpgResult<()> {
        if !self.nodes.contains_key(&edge.from) {
            return Err(RpgError::DanglingReference(edge.from));
        }
        if !self.nodes.contains_key(&edge.to) {
            return Err(RpgError::DanglingReference(edge.to));
        }
        self.data_flow_edges.push(edge);
        Ok(())
    }

    async fn remove_edge(&mut self, source: &str, target: &str, functional: bool) -> RpgResult<()> {
        let keep: Vec<Edge> = self
            .edges
            .drain(..)
            .filter(|e| {
                let (s, t) = e.endpoints();
                let is_match = s == source && t == target;
                let is_functional = matches!(e, Edge::Functional(_));
                !(is_match && is_functional == functional)
            })
            .collect();
        if functional {
            self.functional_parent.remove(target);
        }
        self.out_index.clear();
        self.in_index.clear();
        self.edges.clear();
        for edge in keep {
            self.index_edge_unchecked(edge);
        }
        Ok(())
    }

    async fn get_edges(&self, filter: Option<EdgeFilter>) -> RpgResult<Vec<Edge>> {
        let mut edges: Vec<Edge> = self.edges.clone();
        if let Some(filter) = filter {
            edges.retain(|e| {
                if filter.functional_only && !matches!(e, Edge::Functional(_)) {
                    return false;
                }
                if filter.dependency_only && !matches!(e, Edge::Dependency(_)) {
                    return false;
                }
                if let Some(dep_type) = filter.dependency_type {
                    if let Edge::Dependency(d) = e {
                        if d.dependency_type != dep_type {
                            return false;
                        }
                    } else {
                        return false;
                    }
                }
                true
            });
        }
        Ok(edges)
    }

    async fn get_out_edges(&self, id: &str, functional_only: Option<bool>) -> RpgResult<Vec<Edge>> {
        let idxs = self.out_index.get(id).cloned().unwrap_or_default();
        Ok(idxs
            .into_iter()
            .map(|i| self.edges[i].clone())
            .filter(|e| match functional_only {
                Some(true) => matches!(e, Edge::Functional(_)),
                Some(false) => matches!(e, Edge::Dependency(_)),
                None => true,
            })
            .collect())
    }

    async fn get_in_edges(&self, id: &str, functional_only: Option<bool>) -> RpgResult<Vec<Edge>> {
        let idxs = self.in_index.get(id).cloned().unwrap_or_default();
        Ok(idxs
            .into_iter()
            .map(|i| self.edges[i].clone())
            .filter(|e| match functional_only {
                Some(true) => matches!(e, Edge::Functional(_)),
                Some(false) => matches!(e, Edge::Dependency(_)),
                None => true,
            })
            .collect())
    }

    async fn get_children(&self, id: &str) -> RpgResult<Vec<NodeId>> {
        let idxs = self.out_index.get(id).cloned().unwrap_or_default();
        let mut children: Vec<(NodeId, Option<usize>, usize)> = Vec::new();
        for i in idxs {
            if let Edge::Functional(f) = &self.edges[i] {
                children.push((f.child.clone(), f.sibling_order, i));
            }
        }
        children.sort_by(|a, b| {
            a.1.unwrap_or(usize::MAX)
                .cmp(&b.1.unwrap_or(usize::MAX))
                .then_with(|| a.2.cmp(&b.2))
        });
        Ok(children.into_iter().map(|(id, _, _)| id).collect())
    }

    async fn get_parent(&self, id: &str) -> RpgResult<Option<NodeId>> {
        Ok(self.functional_parent.get(id).cloned())
    }

    async fn get_dependencies(&self, id: &str) -> RpgResult<Vec<NodeId>> {
        let idxs = self.out_index.get(id).cloned().unwrap_or_default();
        Ok(idxs
            .into_iter()
            .filter_map(|i| match &self.edges[i] {
                Edge::Dependency(d) => Some(d.target.clone()),
                Edge::Functional(_) => None,
            })
            .collect())
    }

    async fn get_dependents(&self, id: &str) -> RpgResult<Vec<NodeId>> {
        let idxs = self.in_index.get(id).cloned().unwrap_or_default();
        Ok(idxs
            .into_iter()
            .filter_map(|i| match &self.edges[i] {
                Edge::Dependency(d) => Some(d.source.clone()),
                Edge::Functional(_) => None,
            })
            .collect())
    }

    async fn traverse(
        &self,
        start: &str,
        edge_type: TraverseEdgeType,
        direction: TraverseDirection,
        max_depth: usize,
    ) -> RpgResult<TraversalResult> {
        if !self.nodes.contains_key(start) {
            return Err(RpgError::NodeNotFound(start.to_string()));
        }

        let mut visited: HashMap<NodeId, usize> = HashMap::new();
        visited.insert(start.to_string(), 0);
        let mut queue: VecDeque<(NodeId, usize)> = VecDeque::new();
        queue.push_back((start.to_string(), 0));
        let mut traversed_edges: Vec<Edge> = Vec::new();
        let mut max_depth_reached = 0usize;

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for (edge, neighbor, is_out) in self.neighbor_edges(&current, edge_type, direction) {
                if visited.contains_key(&neighbor) {
                    continue;
                }
                visited.insert(neighbor.clone(), depth + 1);
                max_depth_reached = max_depth_reached.max(depth + 1);
                traversed_edges.push(edge);
                queue.push_back((neighbor, depth + 1));
                let _ = is_out;
            }
        }

        let mut nodes: Vec<NodeId> = visited.into_keys().filter(|id| id != start).collect();
        nodes.sort_by_key(|id| self.node_seq(id));
        Ok(TraversalResult {
            nodes,
            edges: traversed_edges,
            max_depth_reached,
        })
    }

    async fn search_by_feature(
        &self,
        query: &str,
        scopes: Option<&[String]>,
    ) -> RpgResult<Vec<ScoredNode>> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let allowed: Option<HashSet<String>> = scopes.map(|scopes| {
            let mut set = HashSet::new();
            for scope in scopes {
                set.extend(self.functional_subtree(scope));
            }
            set
        });
        let hits = self.feature_index.search_prefix(&terms, allowed.as_ref());
        Ok(hits
            .into_iter()
            .map(|(node_id, score)| ScoredNode { node_id, score })
            .collect())
    }

    async fn search_by_path(&self, pattern: &str) -> RpgResult<Vec<NodeId>> {
        let regex = glob_to_regex(pattern);
        let re = regex::Regex::new(&regex).map_err(|e| RpgError::InvalidInput(e.to_string()))?;
        let mut matches: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.path().is_some_and(|p| re.is_match(p)))
            .map(|n| n.id.clone())
            .collect();
        matches.sort_by_key(|id| self.node_seq(id));
        Ok(matches)
    }

    async fn search_vector(&self, query_vector: &[f32], k: usize) -> RpgResult<Vec<ScoredNode>> {
        Ok(self
            .vector_index
            .search(query_vector, k)
            .into_iter()
            .map(|(node_id, score)| ScoredNode { node_id, score })
            .collect())
    }

    async fn search_hybrid(
        &self,
        query: &str,
        query_vector: Option<&[f32]>,
        k: usize,
        vector_weight: f64,
    ) -> RpgResult<Vec<ScoredNode>> {
        let terms = tokenize(query);
        let fetch = k.saturating_mul(2).max(1);
        let fts_ranked = self.full_index.ranked_ids(&terms, fetch);
        let vector_ranked = match query_vector {
            Some(qv) if !self.vector_index.is_empty() => self.vector_index.ranked_ids(qv, fetch),
            _ => Vec::new(),
        };
        let fused = reciprocal_rank_fusion(&vector_ranked, &fts_ranked, vector_weight, 60);
        Ok(fused
            .into_iter()
            .take(k)
            .map(|(node_id, score)| ScoredNode { node_id, score })
            .collect())
    }

    async fn topological_order(&self) -> RpgResult<Vec<NodeId>> {
        // Kahn's algorithm over dependency edges: nodes without *outgoing*
        // dependency edges come first, so we run Kahn's on the reversed
        // graph (peeling off nodes with in-degree 0 in reverse == out-degree
        // 0 in forward) and reverse the result.
        let mut out_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for id in self.nodes.keys() {
            out_degree.insert(id.clone(), 0);
        }
        for edge in &self.edges {
            if let Edge::Dependency(d) = edge {
                *out_degree.entry(d.source.clone()).or_insert(0) += 1;
                dependents.entry(d.target.clone()).or_default().push(d.source.clone());
            }
        }

        let mut ready: Vec<NodeId> = out_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(id, _)| id.clone())
            .collect();
        ready.sort_by_key(|id| self.node_seq(id));
        let mut queue: VecDeque<NodeId> = ready.into();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop_front() {
            order.push(id.clone());
            if let Some(deps) = dependents.get(&id) {
                let mut newly_ready = Vec::new();
                for dependent in deps {
                    if let Some(deg) = out_degree.get_mut(dependent) {
                        *deg -= 1;
                        if *deg == 0 {
                            newly_ready.push(dependent.clone());
                        }
                    }
                }
                newly_ready.sort_by_key(|id| self.node_seq(id));
                for id in newly_ready {
                    queue.push_back(id);
                }
            }
        }

        // Any remaining nodes are part of a dependency cycle; append them
        // in insertion order rather than dropping them.
        if order.len() < self.nodes.len() {
            let seen: HashSet<&NodeId> = order.iter().collect();
            let mut remaining: Vec<NodeId> = self
                .nodes
                .keys()
                .filter(|id| !seen.contains(id))
                .cloned()
                .collect();
            remaining.sort_by_key(|id| self.node_seq(id));
            order.extend(remaining);
        }

        Ok(order)
    }

    async fn stats(&self) -> RpgResult<GraphStats> {
        let mut stats = GraphStats::default();
        for node in self.nodes.values() {
            match node.variant() {
                NodeVariant::HighLevel => stats.high_level_count += 1,
                NodeVariant::LowLevel => stats.low_level_count += 1,
            }
        }
        for edge in &self.edges {
            match edge {
                Edge::Functional(_) => stats.functional_edge_count += 1,
                Edge::Dependency(_) => stats.dependency_edge_count += 1,
            }
        }
        stats.data_flow_edge_count = self.data_flow_edges.len();
        Ok(stats)
    }

    async fn export(&self) -> RpgResult<GraphEnvelope> {
        let mut nodes: Vec<Node> = self.nodes.values().cloned().collect();
        nodes.sort_by_key(|n| self.node_seq(&n.id));
        Ok(GraphEnvelope {
            version: crate::schema::CURRENT_VERSION.to_string(),
            config: self.config.clone(),
            nodes,
            edges: self.edges.clone(),
            data_flow_edges: self.data_flow_edges.clone(),
        })
    }

    async fn import(&mut self, envelope: GraphEnvelope) -> RpgResult<()> {
        self.config = envelope.config;
        self.nodes.clear();
        self.node_order.clear();
        self.edges.clear();
        self.data_flow_edges.clear();
        self.out_index.clear();
        self.in_index.clear();
        self.functional_parent.clear();
        self.feature_index = TextIndex::new();
        self.full_index = TextIndex::new();
        self.next_seq = 0;

        for node in envelope.nodes {
            let seq = self.next_seq();
            self.node_order.insert(node.id.clone(), seq);
            self.index_node(&node);
            self.nodes.insert(node.id.clone(), node);
        }
        for edge in envelope.edges {
            self.index_edge_unchecked(edge);
        }
        self.data_flow_edges = envelope.data_flow_edges;
        Ok(())
    }

    async fn close(&mut self) -> RpgResult<()> {
        if let Some(path) = self.path.clone() {
            let envelope = self.export().await?;
            crate::storage::save_envelope(&path, &envelope)
                .map_err(|e| RpgError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}

impl MemoryGraphStore {
    /// Neighbor edges of `node_id` under `edge_type`/`direction`, returned
    /// as `(edge, neighbor_id, was_outgoing)`, in a stable (insertion) order.
    fn neighbor_edges(
        &self,
        node_id: &str,
        edge_type: TraverseEdgeType,
        direction: TraverseDirection,
    ) -> Vec<(Edge, NodeId, bool)> {
        let mut results = Vec::new();
        let include = |e: &Edge| match edge_type {
            TraverseEdgeType::Functional => matches!(e, Edge::Functional(_)),
            TraverseEdgeType::Dependency => matches!(e, Edge::Dependency(_)),
            TraverseEdgeType::Both => true,
        };

        if matches!(direction, TraverseDirection::Out | TraverseDirection::Both) {
            for &i in self.out_index.get(node_id).into_iter().flatten() {
                let edge = &self.edges[i];
                if include(edge) {
                    let (_, target) = edge.endpoints();
                    results.push((edge.clone(), target.to_string(), true));
                }
            }
        }
        if matches!(direction, TraverseDirection::In | TraverseDirection::Both) {
            for &i in self.in_index.get(node_id).into_iter().flatten() {
                let edge = &self.edges[i];
                if include(edge) {
                    let (source, _) = edge.endpoints();
                    results.push((edge.clone(), source.to_string(), false));
                }
            }
        }
        results
    }
}

/// Convert a shell glob (`*`, `**`) and/or an embedded regex-style `.*`
/// into a regex pattern anchored to the full path.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // Consume an optional following slash so `**/` doesn't
                    // require an extra path segment.
                    if chars.peek() == Some(&'/') {
                        chars.next();
                    }
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '.' => out.push_str("\\."),
            c if "+()|^$[]{}\\".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::SemanticFeature;
    use crate::model::{DependencyType, LowLevelKind};

    fn node(id: &str, desc: &str) -> Node {
        Node::new_low_level(id, LowLevelKind::Function, SemanticFeature::new(desc, []))
    }

    #[tokio::test]
    async fn duplicate_node_rejected() {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        store.add_node(node("a", "does a")).await.unwrap();
        let err = store.add_node(node("a", "does a again")).await.unwrap_err();
        assert!(matches!(err, RpgError::DuplicateNode(_)));
    }

    #[tokio::test]
    async fn dangling_edge_rejected() {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        store.add_node(node("a", "does a")).await.unwrap();
        let err = store
            .add_edge(Edge::Dependency(DependencyEdge {
                source: "a".into(),
                target: "missing".into(),
                dependency_type: DependencyType::Import,
                is_runtime: None,
                line: None,
                weight: None,
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, RpgError::DanglingReference(_)));
    }

    #[tokio::test]
    async fn data_flow_edge_requires_both_endpoints() {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        store.add_node(node("a", "does a")).await.unwrap();
        let err = store
            .add_data_flow_edge(crate::model::DataFlowEdge {
                from: "a".into(),
                to: "missing".into(),
                data_id: "src/a.ts".into(),
                data_type: "import".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RpgError::DanglingReference(_)));

        store.add_node(node("b", "does b")).await.unwrap();
        store
            .add_data_flow_edge(crate::model::DataFlowEdge {
                from: "a".into(),
                to: "b".into(),
                data_id: "src/a.ts".into(),
                data_type: "import".into(),
            })
            .await
            .unwrap();
        assert_eq!(store.stats().await.unwrap().data_flow_edge_count, 1);
    }

    #[tokio::test]
    async fn remove_node_cascades_edges() {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        store.add_node(node("a", "does a")).await.unwrap();
        store.add_node(node("b", "does b")).await.unwrap();
        store
            .add_edge(Edge::Functional(FunctionalEdge {
                parent: "a".into(),
                child: "b".into(),
                level: None,
                sibling_order: Some(0),
            }))
            .await
            .unwrap();
        store.remove_node("a").await.unwrap();
        assert!(store.get_edges(None).await.unwrap().is_empty());
        assert!(store.get_parent("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn at_most_one_functional_parent() {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        for id in ["a", "b", "c"] {
            store.add_node(node(id, id)).await.unwrap();
        }
        store
            .add_edge(Edge::Functional(FunctionalEdge {
                parent: "a".into(),
                child: "c".into(),
                level: None,
                sibling_order: Some(0),
            }))
            .await
            .unwrap();
        let err = store
            .add_edge(Edge::Functional(FunctionalEdge {
                parent: "b".into(),
                child: "c".into(),
                level: None,
                sibling_order: Some(0),
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, RpgError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn children_ordered_by_sibling_order() {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        for id in ["root", "auth", "api"] {
            store.add_node(node(id, id)).await.unwrap();
        }
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
                parent: "root".into(),
                child: "auth".into(),
                level: None,
                sibling_order: Some(0),
            }))
            .await
            .unwrap();
        let children = store.get_children("root").await.unwrap();
        assert_eq!(children, vec!["auth".to_string(), "api".to_string()]);
    }

    #[tokio::test]
    async fn topological_order_respects_dependencies() {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        for id in ["login", "api"] {
            store.add_node(node(id, id)).await.unwrap();
        }
        store
            .add_edge(Edge::Dependency(DependencyEdge {
                source: "login".into(),
                target: "api".into(),
                dependency_type: DependencyType::Import,
                is_runtime: None,
                line: None,
                weight: None,
            }))
            .await
            .unwrap();
        let order = store.topological_order().await.unwrap();
        let api_idx = order.iter().position(|id| id == "api").unwrap();
        let login_idx = order.iter().position(|id| id == "login").unwrap();
        assert!(api_idx < login_idx);
    }

    #[tokio::test]
    async fn search_by_feature_finds_description_words() {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        store
            .add_node(node("auth", "authentication and authorization module"))
            .await
            .unwrap();
        store.add_node(node("billing", "invoice generator")).await.unwrap();
        let hits = store.search_by_feature("authentication", None).await.unwrap();
        assert_eq!(hits[0].node_id, "auth");
    }

    #[tokio::test]
    async fn search_by_feature_scope_restricts_results() {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        store
            .add_node(Node::new_high_level("root", SemanticFeature::new("root", [])))
            .await
            .unwrap();
        store
            .add_node(Node::new_high_level(
                "other-subtree",
                SemanticFeature::new("other", []),
            ))
            .await
            .unwrap();
        store
            .add_node(node("auth", "authentication and authorization module"))
            .await
            .unwrap();
        store
            .add_edge(Edge::Functional(FunctionalEdge {
                parent: "root".into(),
                child: "auth".into(),
                level: None,
                sibling_order: Some(0),
            }))
            .await
            .unwrap();

        let scoped = store
            .search_by_feature("authentication", Some(&["other-subtree".to_string()]))
            .await
            .unwrap();
        assert!(scoped.is_empty());
    }

    #[tokio::test]
    async fn export_import_round_trips() {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig {
            name: "demo".into(),
            ..Default::default()
        });
        store.add_node(node("a", "does a")).await.unwrap();
        store.add_node(node("b", "does b")).await.unwrap();
        store
            .add_edge(Edge::Functional(FunctionalEdge {
                parent: "a".into(),
                child: "b".into(),
                level: None,
                sibling_order: Some(0),
            }))
            .await
            .unwrap();

        let envelope = store.export().await.unwrap();
        let mut restored = MemoryGraphStore::open_memory(RepositoryConfig::default());
        restored.import(envelope).await.unwrap();

        let before = store.stats().await.unwrap();
        let after = restored.stats().await.unwrap();
        assert_eq!(before.low_level_count, after.low_level_count);
        assert_eq!(before.functional_edge_count, after.functional_edge_count);
    }

    #[tokio::test]
    async fn glob_path_search_matches_double_star() {
        let mut store = MemoryGraphStore::open_memory(RepositoryConfig::default());
        let mut n = node("a", "entry point");
        n.metadata = Some(crate::model::Metadata {
            path: Some("src/routes/auth/login.ts".into()),
            ..Default::default()
        });
        store.add_node(n).await.unwrap();
        let hits = store.search_by_path("src/**/*.ts").await.unwrap();
        assert_eq!(hits, vec!["a".to_string()]);
    }
}
