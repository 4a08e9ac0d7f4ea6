//! Semantic features: the compact description + keyword set attached to
//! every node.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tokens of length <= this are dropped from a keyword set (invariant 5).
const MAX_DROPPED_KEYWORD_LEN: usize = 2;

/// A compact description plus a deduplicated, lower-cased keyword set,
/// with optional ordered sub-features for finer-grained decomposition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticFeature {
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_features: Option<Vec<SemanticFeature>>,
}

impl SemanticFeature {
    pub fn new(description: impl Into<String>, keywords: impl IntoIterator<Item = String>) -> Self {
        let mut f = Self {
            description: description.into().to_lowercase(),
            keywords: Vec::new(),
            sub_features: None,
        };
        f.set_keywords(keywords);
        f
    }

    /// Replace the keyword set, applying the normalisation rules from
    /// invariant 5: dedup, lower-case, strip, drop tokens of length <= 2.
    pub fn set_keywords(&mut self, keywords: impl IntoIterator<Item = String>) {
        self.keywords = normalize_keywords(keywords);
    }

    /// Merge additional keywords into the existing set, keeping it sorted
    /// and deduplicated.
    pub fn merge_keywords(&mut self, extra: impl IntoIterator<Item = String>) {
        let mut set: BTreeSet<String> = self.keywords.iter().cloned().collect();
        for kw in normalize_keywords(extra) {
            set.insert(kw);
        }
        self.keywords = set.into_iter().collect();
    }

    pub fn keyword_set(&self) -> BTreeSet<String> {
        self.keywords.iter().cloned().collect()
    }

    /// Jaccard distance between this feature's keyword set and another's:
    /// `1 - |A ∩ B| / |A ∪ B|`, defined as `0` when both sets are empty.
    pub fn jaccard_distance(&self, other: &SemanticFeature) -> f64 {
        let a = self.keyword_set();
        let b = other.keyword_set();
        jaccard_distance(&a, &b)
    }
}

/// Normalise a keyword iterator per invariant 5: lower-case, trim, drop
/// tokens of length <= 2, deduplicate (sorted for determinism).
pub fn normalize_keywords(keywords: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut set = BTreeSet::new();
    for kw in keywords {
        let trimmed = kw.trim().to_lowercase();
        if trimmed.chars().count() > MAX_DROPPED_KEYWORD_LEN {
            set.insert(trimmed);
        }
    }
    set.into_iter().collect()
}

/// Jaccard distance between two keyword sets: `1 - |A ∩ B| / |A ∪ B|`,
/// `0` when both sets are empty.
pub fn jaccard_distance(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        1.0 - (intersection as f64 / union as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_short_tokens() {
        let kws = normalize_keywords(["ab".into(), "abc".into(), "  AB C  ".into()]);
        assert_eq!(kws, vec!["ab c".to_string(), "abc".to_string()]);
    }

    #[test]
    fn dedups_and_lowercases() {
        let kws = normalize_keywords(["Auth".into(), "auth".into(), "AUTH".into()]);
        assert_eq!(kws, vec!["auth".to_string()]);
    }

    #[test]
    fn jaccard_empty_is_zero() {
        let a = BTreeSet::new();
        let b = BTreeSet::new();
        assert_eq!(jaccard_distance(&a, &b), 0.0);
    }

    #[test]
    fn jaccard_disjoint_is_one() {
        let a: BTreeSet<String> = ["parse".into(), "validate".into()].into_iter().collect();
        let b: BTreeSet<String> = ["render".into(), "compile".into()].into_iter().collect();
        assert_eq!(jaccard_distance(&a, &b), 1.0);
    }

    #[test]
    fn jaccard_partial_overlap() {
        let a: BTreeSet<String> = ["parse".into(), "validate".into()].into_iter().collect();
        let b: BTreeSet<String> = ["parse".into(), "render".into()].into_iter().collect();
        // intersection = 1, union = 3
        assert!((jaccard_distance(&a, &b) - (1.0 - 1.0 / 3.0)).abs() < 1e-9);
    }
}
