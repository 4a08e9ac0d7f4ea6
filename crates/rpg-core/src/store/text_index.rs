//! Inverted index with BM25 scoring over per-node documents.
//!
//! A document is built from `(description, keywords, path, qualified_name)`
//! and tokenised on whitespace plus class-boundary (camelCase/snake_case)
//! splits, lower-cased. The index is maintained transactionally with the
//! node: `index()` and `remove()` are the only mutation points, called
//! directly from the store's node CRUD.

use std::collections::HashMap;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

#[derive(Debug, Clone, Default)]
struct Document {
    term_counts: HashMap<String, u32>,
    length: u32,
}

/// BM25-ranked inverted index keyed by node id.
#[derive(Debug, Clone, Default)]
pub struct TextIndex {
    docs: HashMap<String, Document>,
    postings: HashMap<String, Vec<String>>,
    total_length: u64,
}

impl TextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re-)index the document for `node_id`, replacing any prior entry.
    pub fn index(&mut self, node_id: &str, fields: &[&str]) {
        self.remove(node_id);
        let tokens = tokenize(&fields.join(" "));
        if tokens.is_empty() {
            return;
        }
        let mut term_counts: HashMap<String, u32> = HashMap::new();
        for tok in &tokens {
            *term_counts.entry(tok.clone()).or_insert(0) += 1;
            self.postings
                .entry(tok.clone())
                .or_default()
                .push(node_id.to_string());
        }
        self.total_length += tokens.len() as u64;
        self.docs.insert(
            node_id.to_string(),
            Document {
                term_counts,
                length: tokens.len() as u32,
            },
        );
    }

    /// Remove the document for `node_id`, if present.
    pub fn remove(&mut self, node_id: &str) {
        if let Some(doc) = self.docs.remove(node_id) {
            self.total_length = self.total_length.saturating_sub(doc.length as u64);
            for term in doc.term_counts.keys() {
                if let Some(list) = self.postings.get_mut(term) {
                    list.retain(|id| id != node_id);
                    if list.is_empty() {
                        self.postings.remove(term);
                    }
                }
            }
        }
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.docs.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn avg_doc_length(&self) -> f64 {
        if self.docs.is_empty() {
            0.0
        } else {
            self.total_length as f64 / self.docs.len() as f64
        }
    }

    /// Score every indexed document against a single term (exact match),
    /// returning `(node_id, bm25_score)` pairs, unordered.
    fn score_term(&self, term: &str) -> Vec<(String, f64)> {
        let Some(postings) = self.postings.get(term) else {
            return Vec::new();
        };
        let n = self.docs.len() as f64;
        let df = postings.len() as f64;
        // BM25 idf with the +1 smoothing term, floored at 0.
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln().max(0.0);
        let avg_len = self.avg_doc_length();

        postings
            .iter()
            .filter_map(|id| {
                let doc = self.docs.get(id)?;
                let tf = *doc.term_counts.get(term)? as f64;
                let denom = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * doc.length as f64 / avg_len.max(1.0));
                let score = idf * (tf * (BM25_K1 + 1.0)) / denom.max(1e-9);
                Some((id.clone(), score))
            })
            .collect()
    }

    /// Score each prefix-matched query term (disjunction across words)
    /// against the index, restricted to `allowed` ids if given, and
    /// return best-first scored hits.
    pub fn search_prefix(&self, terms: &[String], allowed: Option<&std::collections::HashSet<String>>) -> Vec<(String, f64)> {
        let mut scores: HashMap<String, f64> = HashMap::new();
        for term in terms {
            // Prefix match: any indexed term starting with the query term
            // contributes its BM25 score for this query word.
            let matching_terms: Vec<&String> = self
                .postings
                .keys()
                .filter(|t| t.starts_with(term.as_str()))
                .collect();
            for mt in matching_terms {
                for (id, score) in self.score_term(mt) {
                    if let Some(allowed) = allowed {
                        if !allowed.contains(&id) {
                            continue;
                        }
                    }
                    *scores.entry(id).or_insert(0.0) += score;
                }
            }
        }
        let mut results: Vec<(String, f64)> = scores.into_iter().collect();
        // Score descending, ties by id ascending.
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results
    }

    /// Rank order of every document for `terms`, used by hybrid RRF fusion.
    pub fn ranked_ids(&self, terms: &[String], limit: usize) -> Vec<String> {
        self.search_prefix(terms, None)
            .into_iter()
            .take(limit)
            .map(|(id, _)| id)
            .collect()
    }
}

/// Tokenise on whitespace and class-boundary (camelCase / snake_case /
/// kebab-case) runs of alphanumerics, lower-cased — alphanumeric plus
/// underscore runs count as one term.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if ch.is_uppercase() && prev_lower && !current.is_empty() {
                tokens.push(std::mem::take(&mut current).to_lowercase());
            }
            prev_lower = ch.is_lowercase() || ch.is_numeric();
            current.push(ch);
        } else {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current).to_lowercase());
            }
            prev_lower = false;
        }
    }
    if !current.is_empty() {
        tokens.push(current.to_lowercase());
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_camel_and_snake_case() {
        assert_eq!(
            tokenize("authManager handle_request"),
            vec!["auth", "manager", "handle", "request"]
        );
    }

    #[test]
    fn indexes_and_searches() {
        let mut idx = TextIndex::new();
        idx.index("n1", &["authentication and authorization module"]);
        idx.index("n2", &["billing invoice generator"]);
        let hits = idx.search_prefix(&["auth".into()], None);
        assert_eq!(hits[0].0, "n1");
    }

    #[test]
    fn remove_drops_document() {
        let mut idx = TextIndex::new();
        idx.index("n1", &["authentication module"]);
        idx.remove("n1");
        assert!(!idx.contains("n1"));
        assert!(idx.search_prefix(&["auth".into()], None).is_empty());
    }

    #[test]
    fn prefix_match_partial_word() {
        let mut idx = TextIndex::new();
        idx.index("n1", &["validate input payload"]);
        let hits = idx.search_prefix(&["valid".into()], None);
        assert_eq!(hits[0].0, "n1");
    }
}
