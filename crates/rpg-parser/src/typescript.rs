//! TypeScript/TSX entity and import extraction. Reuses the JavaScript
//! walker against the TSX grammar, which is a syntactic superset.

use crate::adapter::{CodeEntity, ImportStatement};
use crate::javascript;
use std::path::Path;

pub fn extract(path: &Path, source: &str) -> (Vec<CodeEntity>, Vec<ImportStatement>) {
    let lang: tree_sitter::Language = tree_sitter_typescript::LANGUAGE_TSX.into();
    javascript::extract_with_language(path, source, &lang)
}
