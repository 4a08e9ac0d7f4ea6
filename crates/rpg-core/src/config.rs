//! Configuration for discovery, semantic lifting, caching, evolution and
//! search.
//!
//! Load order: `.rpg/config.toml` in the project root, then environment
//! variable overrides, then built-in defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration. Every field has a documented default so an
/// empty or missing config file still produces a usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpgConfig {
    pub discovery: DiscoveryConfig,
    pub semantic: SemanticConfig,
    pub cache: CacheConfig,
    pub evolution: EvolutionConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_depth: usize,
    pub respect_gitignore: bool,
    pub include_source: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    pub use_llm: bool,
    pub provider: Option<String>,
    pub max_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Time-to-live in seconds.
    pub ttl_secs: u64,
    pub cache_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub force_regenerate_threshold: f64,
    pub drift_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub hybrid_vector_weight: f64,
    pub rrf_k: u32,
}

impl Default for RpgConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            semantic: SemanticConfig::default(),
            cache: CacheConfig::default(),
            evolution: EvolutionConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            include: vec![
                "**/*.py".into(),
                "**/*.rs".into(),
                "**/*.ts".into(),
                "**/*.tsx".into(),
                "**/*.js".into(),
                "**/*.jsx".into(),
                "**/*.go".into(),
                "**/*.java".into(),
            ],
            exclude: vec![
                "**/node_modules/**".into(),
                "**/target/**".into(),
                "**/dist/**".into(),
                "**/build/**".into(),
                "**/.git/**".into(),
            ],
            max_depth: 10,
            respect_gitignore: true,
            include_source: false,
        }
    }
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            use_llm: has_any_provider_key(),
            provider: None,
            max_tokens: 1024,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 7 * 24 * 60 * 60,
            cache_dir: ".please/cache".into(),
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            force_regenerate_threshold: 0.5,
            drift_threshold: 0.3,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            hybrid_vector_weight: 0.7,
            rrf_k: 60,
        }
    }
}

/// `semantic.use_llm` defaults to true when any recognised provider
/// credential is present in the environment.
fn has_any_provider_key() -> bool {
    for var in ["ANTHROPIC_API_KEY", "OPENAI_API_KEY", "RPG_LLM_API_KEY"] {
        if std::env::var(var).is_ok_and(|v| !v.is_empty()) {
            return true;
        }
    }
    false
}

/// Apply an environment variable override to a parseable config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var) {
        if let Ok(parsed) = v.parse() {
            *target = parsed;
        }
    }
}

impl RpgConfig {
    /// Load from `<project_root>/.rpg/config.toml`, applying environment
    /// overrides on top. Falls back to defaults when no file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(".rpg").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        env_override("RPG_MAX_DEPTH", &mut config.discovery.max_depth);
        env_override(
            "RPG_RESPECT_GITIGNORE",
            &mut config.discovery.respect_gitignore,
        );
        env_override("RPG_USE_LLM", &mut config.semantic.use_llm);
        env_override("RPG_MAX_TOKENS", &mut config.semantic.max_tokens);
        env_override("RPG_CACHE_ENABLED", &mut config.cache.enabled);
        env_override("RPG_CACHE_TTL_SECS", &mut config.cache.ttl_secs);
        env_override(
            "RPG_FORCE_REGENERATE_THRESHOLD",
            &mut config.evolution.force_regenerate_threshold,
        );
        env_override(
            "RPG_DRIFT_THRESHOLD",
            &mut config.evolution.drift_threshold,
        );
        env_override(
            "RPG_HYBRID_VECTOR_WEIGHT",
            &mut config.search.hybrid_vector_weight,
        );

        if !(0.0..=1.0).contains(&config.evolution.drift_threshold) {
            anyhow::bail!(
                "evolution.drift_threshold ({}) must be within [0.0, 1.0]",
                config.evolution.drift_threshold
            );
        }
        if !(0.0..=1.0).contains(&config.search.hybrid_vector_weight) {
            anyhow::bail!(
                "search.hybrid_vector_weight ({}) must be within [0.0, 1.0]",
                config.search.hybrid_vector_weight
            );
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = RpgConfig {
            semantic: SemanticConfig {
                use_llm: false,
                ..SemanticConfig::default()
            },
            ..RpgConfig::default()
        };
        assert_eq!(config.discovery.max_depth, 10);
        assert!(config.discovery.respect_gitignore);
        assert_eq!(config.semantic.max_tokens, 1024);
        assert_eq!(config.cache.ttl_secs, 7 * 24 * 60 * 60);
        assert_eq!(config.evolution.force_regenerate_threshold, 0.5);
        assert_eq!(config.evolution.drift_threshold, 0.3);
        assert_eq!(config.search.hybrid_vector_weight, 0.7);
        assert_eq!(config.search.rrf_k, 60);
    }

    #[test]
    fn load_nonexistent_falls_back_to_defaults() {
        let config = RpgConfig::load(Path::new("/nonexistent/path/for/rpg")).unwrap();
        assert_eq!(config.discovery.max_depth, 10);
    }

    #[test]
    fn load_from_toml_overrides_selectively() {
        let tmp = tempfile::tempdir().unwrap();
        let rpg_dir = tmp.path().join(".rpg");
        std::fs::create_dir_all(&rpg_dir).unwrap();
        std::fs::write(
            rpg_dir.join("config.toml"),
            r#"
[discovery]
max_depth = 4

[evolution]
drift_threshold = 0.45
"#,
        )
        .unwrap();

        let config = RpgConfig::load(tmp.path()).unwrap();
        assert_eq!(config.discovery.max_depth, 4);
        assert_eq!(config.evolution.drift_threshold, 0.45);
        // Untouched sections keep their defaults.
        assert_eq!(config.evolution.force_regenerate_threshold, 0.5);
    }

    #[test]
    fn rejects_out_of_range_drift_threshold() {
        let tmp = tempfile::tempdir().unwrap();
        let rpg_dir = tmp.path().join(".rpg");
        std::fs::create_dir_all(&rpg_dir).unwrap();
        std::fs::write(
            rpg_dir.join("config.toml"),
            "[evolution]\ndrift_threshold = 1.5\n",
        )
        .unwrap();

        assert!(RpgConfig::load(tmp.path()).is_err());
    }
}
