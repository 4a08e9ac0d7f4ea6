//! Read/write RPG graph files from disk.

use crate::config::CacheConfig;
use crate::schema::{self, GraphEnvelope};
use anyhow::{Context, Result};
use std::fs;
use std::io::Read as _;
use std::path::{Path, PathBuf};

const RPG_DIR: &str = ".rpg";
const RPG_FILE: &str = "graph.json";
const RPG_BACKUP_FILE: &str = "graph.backup.json";

/// Zstd magic bytes: 0x28 0xB5 0x2F 0xFD.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

const RPG_README: &str = "\
# .rpg/\n\n\
This directory holds the Repository Planning Graph for this project.\n\n\
- `graph.json` is the serialised graph (nodes, edges, config). It is meant to\n  \
  be committed alongside the code it describes.\n\
- `config.toml`, if present, holds local overrides and is not committed.\n";

/// Path to the RPG directory for a given project root.
pub fn rpg_dir(project_root: &Path) -> PathBuf {
    project_root.join(RPG_DIR)
}

/// Path to the RPG graph file for a given project root.
pub fn rpg_file(project_root: &Path) -> PathBuf {
    rpg_dir(project_root).join(RPG_FILE)
}

/// Whether an RPG graph file exists under `project_root`.
pub fn rpg_exists(project_root: &Path) -> bool {
    rpg_file(project_root).exists()
}

/// Path to the RPG backup file for a given project root.
pub fn rpg_backup_file(project_root: &Path) -> PathBuf {
    rpg_dir(project_root).join(RPG_BACKUP_FILE)
}

/// Copy the current graph aside before a destructive operation (e.g. an
/// evolution pass). Returns `None` when no graph exists yet.
pub fn create_backup(project_root: &Path) -> Result<Option<PathBuf>> {
    if !rpg_exists(project_root) {
        return Ok(None);
    }
    let source = rpg_file(project_root);
    let dest = rpg_backup_file(project_root);
    fs::copy(&source, &dest).with_context(|| {
        format!("failed to backup {} to {}", source.display(), dest.display())
    })?;
    Ok(Some(dest))
}

/// Load an RPG envelope from `<project_root>/.rpg/graph.json`, transparently
/// decompressing zstd-compressed files (detected by magic bytes).
pub fn load(project_root: &Path) -> Result<GraphEnvelope> {
    load_envelope(&rpg_file(project_root))
}

/// Load an RPG envelope from an arbitrary path.
pub fn load_envelope(path: &Path) -> Result<GraphEnvelope> {
    let raw = fs::read(path).with_context(|| format!("failed to read RPG from {}", path.display()))?;

    let json = if raw.len() >= 4 && raw[..4] == ZSTD_MAGIC {
        let mut decoder = zstd::Decoder::new(&raw[..]).context("failed to init zstd decoder")?;
        let mut decompressed = String::new();
        decoder
            .read_to_string(&mut decompressed)
            .context("failed to decompress graph.json")?;
        decompressed
    } else {
        String::from_utf8(raw).context("graph.json is not valid UTF-8")?
    };

    schema::from_json(&json)
}

/// Save an envelope to `<project_root>/.rpg/graph.json`, uncompressed.
/// Also writes `.rpg/.gitignore` and `.rpg/README.md` on first save.
pub fn save(project_root: &Path, envelope: &GraphEnvelope) -> Result<()> {
    save_with_config(project_root, envelope, &CacheConfig::default(), false)
}

/// Save with explicit compression control. `compress` enables zstd level 3.
pub fn save_with_config(
    project_root: &Path,
    envelope: &GraphEnvelope,
    _cache_config: &CacheConfig,
    compress: bool,
) -> Result<()> {
    let dir = rpg_dir(project_root);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create RPG directory {}", dir.display()))?;

    write_envelope(&rpg_file(project_root), envelope, compress)?;

    let inner_gitignore = dir.join(".gitignore");
    if !inner_gitignore.exists() {
        let _ = fs::write(&inner_gitignore, "config.toml\n");
    }

    let readme = dir.join("README.md");
    if !readme.exists() {
        let _ = fs::write(&readme, RPG_README);
    }

    Ok(())
}

/// Save an envelope to an arbitrary path, uncompressed, creating parent
/// directories as needed. Used by store backends keyed on a direct path
/// rather than a project root.
pub fn save_envelope(path: &Path, envelope: &GraphEnvelope) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    write_envelope(path, envelope, false)
}

fn write_envelope(path: &Path, envelope: &GraphEnvelope, compress: bool) -> Result<()> {
    let json = schema::to_json(envelope)?;
    if compress {
        let compressed =
            zstd::encode_all(json.as_bytes(), 3).context("failed to compress graph.json with zstd")?;
        fs::write(path, compressed).with_context(|| format!("failed to write {}", path.display()))?;
    } else {
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Ensure `.rpg/.gitignore` exists, creating the directory if needed.
/// Returns `true` if it already existed.
pub fn ensure_gitignore(project_root: &Path) -> Result<bool> {
    let dir = rpg_dir(project_root);
    fs::create_dir_all(&dir)?;
    let inner_gitignore = dir.join(".gitignore");
    if inner_gitignore.exists() {
        return Ok(true);
    }
    fs::write(&inner_gitignore, "config.toml\n")?;
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RepositoryConfig;

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let envelope = GraphEnvelope::new(RepositoryConfig {
            name: "demo".into(),
            ..Default::default()
        });

        save(root, &envelope).unwrap();
        assert!(rpg_exists(root));

        let loaded = load(root).unwrap();
        assert_eq!(loaded.config.name, "demo");
        assert!(root.join(".rpg/.gitignore").exists());
        assert!(root.join(".rpg/README.md").exists());
    }

    #[test]
    fn compressed_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let envelope = GraphEnvelope::new(RepositoryConfig::default());
        save_with_config(root, &envelope, &CacheConfig::default(), true).unwrap();
        let loaded = load(root).unwrap();
        assert_eq!(loaded.version, schema::CURRENT_VERSION);
    }

    #[test]
    fn backup_is_none_when_no_graph_exists() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(create_backup(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn backup_copies_existing_graph() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        save(root, &GraphEnvelope::new(RepositoryConfig::default())).unwrap();
        let backup = create_backup(root).unwrap().unwrap();
        assert!(backup.exists());
    }
}
