//! File discovery for a full encode.
//!
//! Prefers asking git for the tracked + untracked-non-ignored file set when
//! the root is a working tree; falls back to an `ignore`-crate walk
//! otherwise. Either way the result is filtered by include/exclude globs
//! and capped at `max_depth`, then sorted for determinism.

use globset::{Glob, GlobSet, GlobSetBuilder};
use rpg_core::config::DiscoveryConfig;
use rpg_core::error::{Warning, WarningKind};
use std::path::{Path, PathBuf};

/// A discovered file, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DiscoveredFile {
    pub relative_path: PathBuf,
}

fn build_glob_set(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for p in patterns {
        if let Ok(glob) = Glob::new(p) {
            builder.add(glob);
        }
    }
    builder.build().ok()
}

fn depth_of(path: &Path) -> usize {
    path.components().count()
}

/// Discover files under `project_root` matching `config`. Never fails: a
/// repository with no git tree and no readable files returns an empty list
/// plus warnings, not an error.
pub fn discover(project_root: &Path, config: &DiscoveryConfig) -> (Vec<DiscoveredFile>, Vec<Warning>) {
    let include_set = build_glob_set(&config.include);
    let exclude_set = build_glob_set(&config.exclude);
    let mut warnings = Vec::new();

    let candidates = if config.respect_gitignore {
        match git_tracked_files(project_root) {
            Some(files) => files,
            None => walk_directory(project_root, config.max_depth, &mut warnings),
        }
    } else {
        walk_directory(project_root, config.max_depth, &mut warnings)
    };

    let mut files: Vec<DiscoveredFile> = candidates
        .into_iter()
        .filter(|rel| {
            if depth_of(rel) > config.max_depth {
                return false;
            }
            if let Some(inc) = &include_set {
                if !inc.is_match(rel) {
                    return false;
                }
            }
            if let Some(exc) = &exclude_set {
                if exc.is_match(rel) {
                    return false;
                }
            }
            true
        })
        .map(|relative_path| DiscoveredFile { relative_path })
        .collect();

    files.sort();
    files.dedup();
    (files, warnings)
}

/// Ask git for tracked + untracked-non-ignored files. Returns `None` when
/// `project_root` is not a git working tree, so the caller falls back to a
/// plain directory walk.
fn git_tracked_files(project_root: &Path) -> Option<Vec<PathBuf>> {
    let repo = git2::Repository::discover(project_root).ok()?;
    let workdir = repo.workdir()?;
    if workdir != project_root && !project_root.starts_with(workdir) {
        return None;
    }

    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repo.statuses(Some(&mut opts)).ok()?;

    let mut paths = Vec::new();
    for entry in statuses.iter() {
        if let Some(path) = entry.path() {
            paths.push(PathBuf::from(path));
        }
    }

    // Index also carries files untouched since the last commit, which
    // `statuses()` won't surface (only dirty/untracked entries do).
    let index = repo.index().ok()?;
    for entry in index.iter() {
        if let Ok(path) = String::from_utf8(entry.path) {
            paths.push(PathBuf::from(path));
        }
    }

    paths.sort();
    paths.dedup();
    Some(paths)
}

/// Walk the directory tree with the `ignore` crate, honouring `.gitignore`
/// semantics regardless of whether a git repository is actually present.
fn walk_directory(project_root: &Path, max_depth: usize, warnings: &mut Vec<Warning>) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let walker = ignore::WalkBuilder::new(project_root)
        .hidden(true)
        .git_ignore(true)
        .max_depth(Some(max_depth + 1))
        .build();

    for entry in walker {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                if let Ok(rel) = path.strip_prefix(project_root) {
                    files.push(rel.to_path_buf());
                }
            }
            Err(e) => {
                warnings.push(Warning::new(
                    WarningKind::DiscoveryUnreadableDir,
                    e.to_string(),
                ));
            }
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn discovers_and_filters_by_include_exclude() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "src/main.ts", "export function greet() {}");
        write(root, "src/utils.ts", "export class Logger {}");
        write(root, "node_modules/pkg/index.ts", "module.exports = {}");
        write(root, "README.md", "# demo");

        let config = DiscoveryConfig {
            include: vec!["**/*.ts".into()],
            exclude: vec!["**/node_modules/**".into()],
            max_depth: 10,
            respect_gitignore: false,
            include_source: false,
        };

        let (files, warnings) = discover(root, &config);
        assert!(warnings.is_empty());
        let rels: Vec<_> = files
            .iter()
            .map(|f| f.relative_path.to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rels, vec!["src/main.ts", "src/utils.ts"]);
    }

    #[test]
    fn respects_max_depth() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "a/b/c/d/deep.ts", "export const x = 1;");
        write(root, "shallow.ts", "export const y = 1;");

        let config = DiscoveryConfig {
            include: vec!["**/*.ts".into()],
            exclude: vec![],
            max_depth: 1,
            respect_gitignore: false,
            include_source: false,
        };

        let (files, _) = discover(root, &config);
        let rels: Vec<_> = files
            .iter()
            .map(|f| f.relative_path.to_string_lossy().to_string())
            .collect();
        assert!(rels.contains(&"shallow.ts".to_string()));
        assert!(!rels.iter().any(|r| r.contains("deep.ts")));
    }

    #[test]
    fn empty_repo_yields_no_files_no_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = DiscoveryConfig::default();
        let (files, _warnings) = discover(tmp.path(), &config);
        assert!(files.is_empty());
    }
}
