//! Language detection and tree-sitter grammar loading.

use std::path::Path;

/// Languages the AST adapter supports: Python, one systems language (Rust),
/// one mainstream scripting language with two extensions (TypeScript/
/// JavaScript), one JVM language (Java) and one container-native language
/// (Go).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Rust,
    TypeScript,
    JavaScript,
    Go,
    Java,
}

impl Language {
    /// Detect language from a file extension (no leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" => Some(Self::Python),
            "rs" => Some(Self::Rust),
            "ts" | "tsx" => Some(Self::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Detect the primary (most common) language under `root`.
    pub fn detect_primary(root: &Path) -> Option<Self> {
        let counts = Self::count_files(root);
        let (idx, count) = counts.iter().enumerate().max_by_key(|(_, c)| **c)?;
        if *count == 0 {
            return None;
        }
        Some(Self::from_index(idx))
    }

    /// Every language present under `root`, ordered by file count descending.
    pub fn detect_all(root: &Path) -> Vec<Self> {
        let counts = Self::count_files(root);
        let mut langs: Vec<(Self, usize)> = counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(idx, c)| (Self::from_index(idx), *c))
            .collect();
        langs.sort_by(|a, b| b.1.cmp(&a.1));
        langs.into_iter().map(|(lang, _)| lang).collect()
    }

    fn count_files(root: &Path) -> [usize; 6] {
        let mut counts = [0usize; 6];
        let walker = ignore::WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .add_custom_ignore_filename(".rpgignore")
            .build();
        for entry in walker.flatten() {
            if let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) {
                if let Some(lang) = Self::from_extension(ext) {
                    counts[lang.index()] += 1;
                }
            }
        }
        counts
    }

    /// Source glob pattern for this language, for discovery's include list.
    pub fn glob_pattern(&self) -> &'static str {
        match self {
            Self::Python => "**/*.py",
            Self::Rust => "**/*.rs",
            Self::TypeScript => "**/*.{ts,tsx}",
            Self::JavaScript => "**/*.{js,jsx,mjs,cjs}",
            Self::Go => "**/*.go",
            Self::Java => "**/*.java",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "python" => Some(Self::Python),
            "rust" => Some(Self::Rust),
            "typescript" => Some(Self::TypeScript),
            "javascript" => Some(Self::JavaScript),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Rust => "rust",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Go => "go",
            Self::Java => "java",
        }
    }

    pub fn ts_language(&self) -> tree_sitter::Language {
        match self {
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Python => 0,
            Self::Rust => 1,
            Self::TypeScript => 2,
            Self::JavaScript => 3,
            Self::Go => 4,
            Self::Java => 5,
        }
    }

    fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Python,
            1 => Self::Rust,
            2 => Self::TypeScript,
            3 => Self::JavaScript,
            4 => Self::Go,
            _ => Self::Java,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_detection() {
        assert_eq!(Language::from_extension("py"), Some(Language::Python));
        assert_eq!(Language::from_extension("tsx"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("unknown"), None);
    }

    #[test]
    fn name_roundtrips() {
        for lang in [
            Language::Python,
            Language::Rust,
            Language::TypeScript,
            Language::JavaScript,
            Language::Go,
            Language::Java,
        ] {
            assert_eq!(Language::from_name(lang.name()), Some(lang));
        }
    }
}
