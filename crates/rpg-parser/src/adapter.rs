//! The AST adapter contract: a language-polymorphic boundary.
//! The encoder consumes [`ParseResult`] only and never inspects syntax.

use crate::languages::Language;
use std::path::Path;

/// Kind of a raw extracted entity, before the encoder decides what becomes
/// a graph node. `Module` and `File` entities are surfaced for context but
/// are not lifted into Low-Level nodes directly (the encoder synthesizes
/// the file node itself from its children).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Function,
    Class,
    Method,
    Module,
    File,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Module => "module",
            Self::File => "file",
        }
    }

    /// Convert to the graph's node-level kind, where one exists.
    pub fn to_low_level_kind(self) -> Option<rpg_core::model::LowLevelKind> {
        match self {
            Self::Function => Some(rpg_core::model::LowLevelKind::Function),
            Self::Class => Some(rpg_core::model::LowLevelKind::Class),
            Self::Method => Some(rpg_core::model::LowLevelKind::Method),
            Self::Module | Self::File => None,
        }
    }
}

/// A single extracted entity: identity plus the span it occupies in source.
#[derive(Debug, Clone)]
pub struct CodeEntity {
    pub kind: EntityKind,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub parent: Option<String>,
}

/// A raw import/use statement, unresolved — `Phase 3` grounding resolves
/// `module` against the set of known file ids.
#[derive(Debug, Clone)]
pub struct ImportStatement {
    pub module: String,
}

/// A non-fatal parse problem: the file is skipped but the run continues.
#[derive(Debug, Clone)]
pub struct ParseErrorDetail {
    pub message: String,
}

/// The result of parsing one file.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub language: Option<Language>,
    pub entities: Vec<CodeEntity>,
    pub imports: Vec<ImportStatement>,
    pub errors: Vec<ParseErrorDetail>,
}

impl ParseResult {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            language: None,
            entities: Vec::new(),
            imports: Vec::new(),
            errors: vec![ParseErrorDetail { message: message.into() }],
        }
    }
}

/// Parse a file from disk, detecting its language from the extension.
pub fn parse_file(path: &Path) -> ParseResult {
    let Some(language) = Language::from_path(path) else {
        return ParseResult::failed(format!("unsupported file extension: {}", path.display()));
    };
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => return ParseResult::failed(format!("failed to read {}: {e}", path.display())),
    };
    parse_source(path, &source, language)
}

/// Parse already-loaded source text for a known language. Exposed
/// separately from [`parse_file`] so callers that already hold file
/// contents (e.g. from a git blob) don't need to round-trip through disk.
pub fn parse_source(path: &Path, source: &str, language: Language) -> ParseResult {
    let (entities, imports) = match language {
        Language::Python => crate::python::extract(path, source),
        Language::Rust => crate::rust_lang::extract(path, source),
        Language::TypeScript => crate::typescript::extract(path, source),
        Language::JavaScript => crate::javascript::extract(path, source),
        Language::Go => crate::go::extract(path, source),
        Language::Java => crate::java::extract(path, source),
    };
    ParseResult {
        language: Some(language),
        entities,
        imports,
        errors: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_extension_is_a_soft_error() {
        let result = parse_file(Path::new("README.md"));
        assert!(result.entities.is_empty());
        assert_eq!(result.errors.len(), 1);
    }
}
