//! Content-addressed cache of entity → semantic feature (C3).
//!
//! Keyed by `(file_path, entity_kind, entity_name)`; entries are evicted
//! when their content hash no longer matches or they've outlived the TTL.

use crate::feature::SemanticFeature;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const CACHE_FILE_VERSION: u32 = 1;
const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// The identity half of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub file_path: String,
    pub entity_kind: String,
    pub entity_name: String,
}

impl CacheKey {
    pub fn new(
        file_path: impl Into<String>,
        entity_kind: impl Into<String>,
        entity_name: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            entity_kind: entity_kind.into(),
            entity_name: entity_name.into(),
        }
    }

    /// A stable string encoding used both as a `HashMap` key and as the
    /// on-disk JSON key (joined with a control character unlikely to
    /// appear in any of the three components).
    fn encode(&self) -> String {
        format!("{}\u{1}{}\u{1}{}", self.file_path, self.entity_kind, self.entity_name)
    }
}

/// Compute a stable content hash over `(file_path, kind, name, parent,
/// source_snippet, documentation)`.
pub fn content_hash(
    file_path: &str,
    kind: &str,
    name: &str,
    parent: Option<&str>,
    source_snippet: &str,
    documentation: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(parent.unwrap_or("").as_bytes());
    hasher.update([0u8]);
    hasher.update(source_snippet.as_bytes());
    hasher.update([0u8]);
    hasher.update(documentation.unwrap_or("").as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    feature: SemanticFeature,
    content_hash: String,
    created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: CACHE_FILE_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// Content-addressed semantic feature cache. Loaded lazily on first access
/// and flushed to disk on demand via [`SemanticCache::save`].
#[derive(Debug)]
pub struct SemanticCache {
    path: std::path::PathBuf,
    ttl: Duration,
    file: CacheFile,
    loaded: bool,
    dirty: bool,
}

impl SemanticCache {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self::with_ttl(path, DEFAULT_TTL)
    }

    pub fn with_ttl(path: impl Into<std::path::PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            file: CacheFile::default(),
            loaded: false,
            dirty: false,
        }
    }

    fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return;
        };
        match serde_json::from_str::<CacheFile>(&raw) {
            Ok(file) if file.version == CACHE_FILE_VERSION => {
                self.file = file;
            }
            _ => {
                // Version mismatch or corrupt file: invalidate the whole cache.
                self.file = CacheFile::default();
            }
        }
    }

    /// Return the cached feature iff the stored hash matches and the entry
    /// is younger than the TTL; stale or mismatched entries are evicted.
    pub fn get(&mut self, key: &CacheKey, current_hash: &str) -> Option<SemanticFeature> {
        self.ensure_loaded();
        let encoded = key.encode();
        let now = now_secs();
        let entry = self.file.entries.get(&encoded)?;
        let expired = now.saturating_sub(entry.created_at) > self.ttl.as_secs();
        if expired || entry.content_hash != current_hash {
            self.file.entries.remove(&encoded);
            self.dirty = true;
            return None;
        }
        Some(entry.feature.clone())
    }

    /// Replace the entry for `key` unconditionally.
    pub fn set(&mut self, key: &CacheKey, feature: SemanticFeature, content_hash: String) {
        self.ensure_loaded();
        self.file.entries.insert(
            key.encode(),
            CacheEntry {
                feature,
                content_hash,
                created_at: now_secs(),
            },
        );
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.file.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.entries.is_empty()
    }

    /// Flush to disk. No-op when nothing changed since the last save.
    pub fn save(&mut self) -> std::io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.file)
            .expect("CacheFile serialization cannot fail");
        std::fs::write(&self.path, json)?;
        self.dirty = false;
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Default cache file path under `<project_root>/<cache_dir>/semantic.json`.
pub fn default_cache_path(project_root: &Path, cache_dir: &str) -> std::path::PathBuf {
    project_root.join(cache_dir).join("semantic.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("semantic.json");
        let key = CacheKey::new("src/a.py", "function", "greet");
        let hash = content_hash("src/a.py", "function", "greet", None, "def greet(): ...", None);

        {
            let mut cache = SemanticCache::new(&path);
            assert!(cache.get(&key, &hash).is_none());
            cache.set(&key, SemanticFeature::new("greets the user", ["greet".into()]), hash.clone());
            cache.save().unwrap();
        }

        let mut reloaded = SemanticCache::new(&path);
        let feature = reloaded.get(&key, &hash).expect("cache hit after reload");
        assert_eq!(feature.description, "greets the user");
    }

    #[test]
    fn evicts_on_hash_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = SemanticCache::new(dir.path().join("semantic.json"));
        let key = CacheKey::new("src/a.py", "function", "greet");
        cache.set(&key, SemanticFeature::default(), "hash-a".into());
        assert!(cache.get(&key, "hash-b").is_none());
        // Evicted — a second lookup with the original hash also misses.
        assert!(cache.get(&key, "hash-a").is_none());
    }

    #[test]
    fn evicts_past_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = SemanticCache::with_ttl(dir.path().join("semantic.json"), Duration::from_secs(0));
        let key = CacheKey::new("src/a.py", "function", "greet");
        cache.set(&key, SemanticFeature::default(), "hash-a".into());
        std::thread::sleep(Duration::from_millis(1100));
        assert!(cache.get(&key, "hash-a").is_none());
    }

    #[test]
    fn version_mismatch_invalidates_whole_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("semantic.json");
        std::fs::write(&path, r#"{"version":999,"entries":{}}"#).unwrap();
        let mut cache = SemanticCache::new(&path);
        let key = CacheKey::new("src/a.py", "function", "greet");
        assert!(cache.get(&key, "anything").is_none());
        assert_eq!(cache.len(), 0);
    }
}
