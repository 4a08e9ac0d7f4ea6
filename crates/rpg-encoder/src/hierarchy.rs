//! Phase 2 — structural reorganization.
//!
//! Groups discovered files by top-level directory, asks the LLM (when
//! configured) to propose functional areas, and builds a three-level
//! `Area/category/subcategory` path per file. Skipped silently when no LLM
//! is configured and none was explicitly requested.

use crate::llm::LlmCompletion;
use rpg_core::feature::SemanticFeature;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Per-top-level-directory file features, compressed to file granularity
/// before being shown to the LLM.
#[derive(Debug, Clone)]
pub struct FileFeatureGroup {
    pub top_level_dir: String,
    pub files: Vec<(String, SemanticFeature)>,
}

/// Group file-level features by their top-level directory component.
/// Files directly under the repo root are grouped under `"."`.
pub fn group_by_top_level_dir(file_features: &[(String, SemanticFeature)]) -> Vec<FileFeatureGroup> {
    let mut groups: BTreeMap<String, Vec<(String, SemanticFeature)>> = BTreeMap::new();
    for (path, feature) in file_features {
        let top = Path::new(path)
            .components()
            .next()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());
        groups.entry(top).or_default().push((path.clone(), feature.clone()));
    }
    groups
        .into_iter()
        .map(|(top_level_dir, files)| FileFeatureGroup { top_level_dir, files })
        .collect()
}

/// A proposed three-level hierarchy path for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyAssignment {
    pub file_path: String,
    /// `Area/category/subcategory`, always exactly three segments.
    pub path: String,
}

fn sanitize_segment(segment: &str) -> String {
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        "misc".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Normalise an LLM- or heuristically-proposed path to exactly three
/// slash-separated segments, padding with `"misc"` and truncating excess.
pub fn normalize_hierarchy_path(raw: &str) -> String {
    let mut segments: Vec<String> = raw
        .split('/')
        .map(sanitize_segment)
        .filter(|s| !s.is_empty())
        .collect();
    while segments.len() < 3 {
        segments.push("misc".to_string());
    }
    segments.truncate(3);
    segments.join("/")
}

/// Ask the LLM to propose functional areas for the repository, given one
/// representative file per top-level group. Falls back to using the
/// top-level directory name itself as the sole area when the LLM is
/// unavailable — callers should prefer [`heuristic_hierarchy`] in that case
/// instead of calling this at all.
pub async fn discover_domains(
    llm: &dyn LlmCompletion,
    groups: &[FileFeatureGroup],
    deadline: std::time::Duration,
) -> Result<Vec<String>, crate::llm::LlmError> {
    let schema = serde_json::json!({
        "type": "object",
        "properties": { "areas": { "type": "array", "items": { "type": "string" } } },
        "required": ["areas"]
    });
    let mut prompt = String::from("Propose a short list of functional areas (e.g. Auth, API, UI) for a repository with these top-level groups:\n");
    for group in groups {
        prompt.push_str(&format!("- {} ({} files)\n", group.top_level_dir, group.files.len()));
    }
    let value = llm.complete_json(&prompt, &schema, deadline).await?;
    let areas = value
        .get("areas")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    Ok(areas)
}

/// Build a three-level hierarchy assignment for every file in `groups`
/// without any LLM call: `Area` is the top-level directory (or `"root"`),
/// `category` is the immediate parent directory of the file, `subcategory`
/// is a keyword drawn from the file's own feature. This is what an encode
/// with `use_llm = false` produces — a valid but coarser hierarchy.
pub fn heuristic_hierarchy(groups: &[FileFeatureGroup]) -> Vec<HierarchyAssignment> {
    let mut assignments = Vec::new();
    for group in groups {
        let area = if group.top_level_dir == "." {
            "root".to_string()
        } else {
            group.top_level_dir.clone()
        };
        for (path, feature) in &group.files {
            let parent = Path::new(path)
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "misc".to_string());
            let subcategory = feature
                .keywords
                .first()
                .cloned()
                .unwrap_or_else(|| "misc".to_string());
            assignments.push(HierarchyAssignment {
                file_path: path.clone(),
                path: normalize_hierarchy_path(&format!("{area}/{parent}/{subcategory}")),
            });
        }
    }
    assignments
}

/// Apply an LLM-proposed area list to the same per-file assignment shape as
/// [`heuristic_hierarchy`]: each file is assigned to the area matching its
/// top-level directory's group, falling back to the first proposed area
/// (or a heuristic area name) when the LLM omitted one for that group.
pub fn assign_areas(groups: &[FileFeatureGroup], areas: &[String]) -> Vec<HierarchyAssignment> {
    if areas.is_empty() {
        return heuristic_hierarchy(groups);
    }
    let mut assignments = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        let area = areas.get(i).cloned().unwrap_or_else(|| areas[i % areas.len()].clone());
        for (path, feature) in &group.files {
            let parent = Path::new(path)
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "misc".to_string());
            let subcategory = feature
                .keywords
                .first()
                .cloned()
                .unwrap_or_else(|| "misc".to_string());
            assignments.push(HierarchyAssignment {
                file_path: path.clone(),
                path: normalize_hierarchy_path(&format!("{area}/{parent}/{subcategory}")),
            });
        }
    }
    assignments
}

/// Log a phase-boundary summary the way the encoder's other phases do.
pub fn log_summary(assignments: &[HierarchyAssignment]) {
    let unique_areas: std::collections::BTreeSet<_> = assignments
        .iter()
        .map(|a| a.path.split('/').next().unwrap_or("").to_string())
        .collect();
    info!(files = assignments.len(), areas = unique_areas.len(), "hierarchy constructed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(keywords: &[&str]) -> SemanticFeature {
        SemanticFeature::new("test", keywords.iter().map(|s| s.to_string()))
    }

    #[test]
    fn groups_by_top_level_directory() {
        let files = vec![
            ("src/auth/login.ts".to_string(), feature(&["login"])),
            ("src/auth/logout.ts".to_string(), feature(&["logout"])),
            ("README.md".to_string(), feature(&["readme"])),
        ];
        let groups = group_by_top_level_dir(&files);
        assert_eq!(groups.len(), 2);
        let src_group = groups.iter().find(|g| g.top_level_dir == "src").unwrap();
        assert_eq!(src_group.files.len(), 2);
    }

    #[test]
    fn normalizes_to_exactly_three_segments() {
        assert_eq!(normalize_hierarchy_path("Auth"), "Auth/misc/misc");
        assert_eq!(normalize_hierarchy_path("Auth/core/login/extra"), "Auth/core/login");
        assert_eq!(normalize_hierarchy_path("Auth/core/login"), "Auth/core/login");
    }

    #[test]
    fn heuristic_hierarchy_covers_every_file() {
        let groups = group_by_top_level_dir(&[
            ("src/auth/login.ts".to_string(), feature(&["login"])),
            ("src/api/routes.ts".to_string(), feature(&["routes"])),
        ]);
        let assignments = heuristic_hierarchy(&groups);
        assert_eq!(assignments.len(), 2);
        for a in &assignments {
            assert_eq!(a.path.split('/').count(), 3);
        }
    }
}
