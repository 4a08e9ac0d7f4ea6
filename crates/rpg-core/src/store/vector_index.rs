//! Optional dense vector index: flat storage with brute-force cosine scan.
//!
//! Sized for the thousands-of-nodes range this system targets; a backend
//! wanting approximate search over millions of nodes would swap this module
//! out behind the same [`VectorIndex`] surface.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    vectors: HashMap<String, Vec<f32>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, node_id: &str, vector: Vec<f32>) {
        self.vectors.insert(node_id.to_string(), vector);
    }

    pub fn remove(&mut self, node_id: &str) {
        self.vectors.remove(node_id);
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.vectors.contains_key(node_id)
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// `k` nearest neighbours to `query` by cosine distance, best-first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(String, f64)> {
        let mut scored: Vec<(String, f64)> = self
            .vectors
            .iter()
            .map(|(id, v)| (id.clone(), cosine_similarity(query, v)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    pub fn ranked_ids(&self, query: &[f32], limit: usize) -> Vec<String> {
        self.search(query, limit).into_iter().map(|(id, _)| id).collect()
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Reciprocal Rank Fusion over two rank-ordered id lists:
/// `score(d) = w_v / (k + rank_v) + (1 - w_v) / (k + rank_fts)`. An id
/// missing from one list contributes 0 for that term.
pub fn reciprocal_rank_fusion(
    vector_ranked: &[String],
    fts_ranked: &[String],
    vector_weight: f64,
    k: u32,
) -> Vec<(String, f64)> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    for (rank, id) in vector_ranked.iter().enumerate() {
        *scores.entry(id.clone()).or_insert(0.0) += vector_weight / (k as f64 + rank as f64 + 1.0);
    }
    for (rank, id) in fts_ranked.iter().enumerate() {
        *scores.entry(id.clone()).or_insert(0.0) +=
            (1.0 - vector_weight) / (k as f64 + rank as f64 + 1.0);
    }
    let mut results: Vec<(String, f64)> = scores.into_iter().collect();
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rrf_favours_items_ranked_highly_in_both_lists() {
        let vector_ranked = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let fts_ranked = vec!["b".to_string(), "a".to_string(), "d".to_string()];
        let fused = reciprocal_rank_fusion(&vector_ranked, &fts_ranked, 0.7, 60);
        assert_eq!(fused[0].0, "a");
    }
}
