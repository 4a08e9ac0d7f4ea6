//! Semantic extractor: per-entity feature extraction with a cache-first
//! lookup and a deterministic heuristic fallback when no LLM is configured
//! or the LLM call fails.

use crate::llm::LlmCompletion;
use rpg_core::cache::{content_hash, CacheKey, SemanticCache};
use rpg_core::error::{Warning, WarningKind};
use rpg_core::feature::SemanticFeature;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Everything [`SemanticExtractor::extract`] needs to know about one entity.
pub struct ExtractionInput<'a> {
    pub file_path: &'a str,
    pub kind: &'a str,
    pub name: &'a str,
    pub parent: Option<&'a str>,
    pub source_snippet: &'a str,
    pub documentation: Option<&'a str>,
}

/// Cache-first, LLM-optional feature extractor. Owns no state beyond the
/// cache handle and an optional LLM client; safe to construct per encode
/// run.
pub struct SemanticExtractor {
    cache: Option<SemanticCache>,
    llm: Option<Arc<dyn LlmCompletion>>,
    llm_deadline: Duration,
}

impl SemanticExtractor {
    pub fn new(cache: Option<SemanticCache>, llm: Option<Arc<dyn LlmCompletion>>) -> Self {
        Self {
            cache,
            llm,
            llm_deadline: Duration::from_secs(20),
        }
    }

    pub fn with_llm_deadline(mut self, deadline: Duration) -> Self {
        self.llm_deadline = deadline;
        self
    }

    /// Access the underlying cache, for callers that need to flush it
    /// explicitly after a run (e.g. the encoder pipeline).
    pub fn cache_mut(&mut self) -> Option<&mut SemanticCache> {
        self.cache.as_mut()
    }

    /// Extract (or retrieve from cache) the semantic feature for one entity.
    /// Never fails: an LLM timeout or unavailability degrades to the
    /// heuristic and is recorded as a warning.
    pub async fn extract(&mut self, input: &ExtractionInput<'_>, warnings: &mut Vec<Warning>) -> SemanticFeature {
        let hash = content_hash(
            input.file_path,
            input.kind,
            input.name,
            input.parent,
            input.source_snippet,
            input.documentation,
        );

        if let Some(cache) = &mut self.cache {
            let key = CacheKey::new(input.file_path, input.kind, input.name);
            if let Some(feature) = cache.get(&key, &hash) {
                debug!(entity = input.name, "semantic cache hit");
                return feature;
            }
        }

        let feature = match &self.llm {
            Some(llm) => match self.lift_via_llm(llm.as_ref(), input).await {
                Ok(feature) => feature,
                Err(w) => {
                    warnings.push(w);
                    heuristic_feature(input)
                }
            },
            None => heuristic_feature(input),
        };

        if let Some(cache) = &mut self.cache {
            let key = CacheKey::new(input.file_path, input.kind, input.name);
            cache.set(&key, feature.clone(), hash);
        }

        feature
    }

    async fn lift_via_llm(
        &self,
        llm: &dyn LlmCompletion,
        input: &ExtractionInput<'_>,
    ) -> Result<SemanticFeature, Warning> {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "description": { "type": "string" },
                "keywords": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["description", "keywords"]
        });
        let prompt = format!(
            "Describe the purpose of {} `{}` in {} in one sentence, then list 3-8 keywords.\n```\n{}\n```",
            input.kind, input.name, input.file_path, input.source_snippet
        );

        let value = llm
            .complete_json(&prompt, &schema, self.llm_deadline)
            .await
            .map_err(|e| {
                warn!(entity = input.name, error = %e, "llm feature lift failed, falling back");
                Warning::new(WarningKind::LlmUnavailable, e.to_string())
                    .with_context(input.name.to_string())
            })?;

        let description = value
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or(input.name)
            .to_string();
        let keywords = value
            .get("keywords")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(SemanticFeature::new(description, keywords))
    }
}

/// Split an identifier into lower-case word tokens on `snake_case`,
/// `kebab-case` and `camelCase`/`PascalCase`/acronym boundaries (so
/// `HTTPClient` yields `["http", "client"]`, not one run-on token).
pub fn split_identifier(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &ch) in chars.iter().enumerate() {
        if ch == '_' || ch == '-' || ch == '.' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        let boundary = i > 0 && {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            // lower/digit -> upper: "parseConfig" splits before "Config".
            (prev.is_lowercase() && ch.is_uppercase())
                // end of an acronym run: "HTTPClient" splits before "Client".
                || (prev.is_uppercase() && ch.is_uppercase() && next.is_some_and(|n| n.is_lowercase()))
        };
        if boundary && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Deterministic, LLM-free fallback: derive a description and keyword set
/// from the entity's name, kind and parent alone.
fn heuristic_feature(input: &ExtractionInput<'_>) -> SemanticFeature {
    let words = split_identifier(input.name);
    let description = match input.parent {
        Some(parent) => format!("{} {} on {}", input.kind, words.join(" "), parent),
        None => format!("{} {}", input.kind, words.join(" ")),
    };
    let mut keywords = words;
    keywords.push(input.kind.to_string());
    if let Some(parent) = input.parent {
        keywords.extend(split_identifier(parent));
    }
    SemanticFeature::new(description, keywords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;

    #[test]
    fn splits_snake_and_camel_case() {
        assert_eq!(split_identifier("parse_config_file"), vec!["parse", "config", "file"]);
        assert_eq!(split_identifier("parseConfigFile"), vec!["parse", "config", "file"]);
        assert_eq!(split_identifier("HTTPClient"), vec!["http", "client"]);
    }

    #[tokio::test]
    async fn falls_back_to_heuristic_without_llm() {
        let mut extractor = SemanticExtractor::new(None, None);
        let input = ExtractionInput {
            file_path: "src/auth.py",
            kind: "function",
            name: "validate_token",
            parent: None,
            source_snippet: "def validate_token(t): ...",
            documentation: None,
        };
        let mut warnings = Vec::new();
        let feature = extractor.extract(&input, &mut warnings).await;
        assert!(warnings.is_empty());
        assert!(feature.keywords.contains(&"validate".to_string()));
        assert!(feature.keywords.contains(&"token".to_string()));
    }

    #[tokio::test]
    async fn caches_across_calls_with_unchanged_content() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SemanticCache::new(dir.path().join("semantic.json"));
        let mut extractor = SemanticExtractor::new(Some(cache), None);
        let input = ExtractionInput {
            file_path: "src/auth.py",
            kind: "function",
            name: "validate_token",
            parent: None,
            source_snippet: "def validate_token(t): ...",
            documentation: None,
        };
        let mut warnings = Vec::new();
        let first = extractor.extract(&input, &mut warnings).await;
        let second = extractor.extract(&input, &mut warnings).await;
        assert_eq!(first.description, second.description);
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmCompletion for FailingLlm {
        async fn complete_text(&self, _: &str, _: Duration) -> Result<String, LlmError> {
            Err(LlmError::Unavailable)
        }
        async fn complete_json(
            &self,
            _: &str,
            _: &serde_json::Value,
            _: Duration,
        ) -> Result<serde_json::Value, LlmError> {
            Err(LlmError::Unavailable)
        }
    }

    #[tokio::test]
    async fn llm_failure_degrades_to_heuristic_with_warning() {
        let mut extractor = SemanticExtractor::new(None, Some(Arc::new(FailingLlm)));
        let input = ExtractionInput {
            file_path: "src/auth.py",
            kind: "function",
            name: "validate_token",
            parent: None,
            source_snippet: "def validate_token(t): ...",
            documentation: None,
        };
        let mut warnings = Vec::new();
        let feature = extractor.extract(&input, &mut warnings).await;
        assert_eq!(warnings.len(), 1);
        assert!(feature.keywords.contains(&"token".to_string()));
    }
}
