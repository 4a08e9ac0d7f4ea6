//! JavaScript entity and import extraction via tree-sitter.
//!
//! Shared with [`crate::typescript`], which reuses [`walk`]/[`collect_imports`]
//! against the TypeScript grammar (a superset that adds interfaces/type aliases).

use crate::adapter::{CodeEntity, EntityKind, ImportStatement};
use std::path::Path;

pub fn extract(path: &Path, source: &str) -> (Vec<CodeEntity>, Vec<ImportStatement>) {
    let lang: tree_sitter::Language = tree_sitter_javascript::LANGUAGE.into();
    extract_with_language(path, source, &lang)
}

pub(crate) fn extract_with_language(
    path: &Path,
    source: &str,
    lang: &tree_sitter::Language,
) -> (Vec<CodeEntity>, Vec<ImportStatement>) {
    let mut parser = tree_sitter::Parser::new();
    if parser.set_language(lang).is_err() {
        return (Vec::new(), Vec::new());
    }
    let Some(tree) = parser.parse(source.as_bytes(), None) else {
        return (Vec::new(), Vec::new());
    };
    let _ = path;

    let mut entities = Vec::new();
    walk(&tree.root_node(), source, None, &mut entities);

    let mut imports = Vec::new();
    collect_imports(&tree.root_node(), source, &mut imports);

    (entities, imports)
}

pub(crate) fn walk(
    node: &tree_sitter::Node,
    source: &str,
    parent: Option<&str>,
    entities: &mut Vec<CodeEntity>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = source[name_node.byte_range()].to_string();
                    entities.push(CodeEntity {
                        kind: if parent.is_some() { EntityKind::Method } else { EntityKind::Function },
                        name,
                        start_line: child.start_position().row + 1,
                        end_line: child.end_position().row + 1,
                        parent: parent.map(String::from),
                    });
                }
            }
            "class_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let class_name = source[name_node.byte_range()].to_string();
                    entities.push(CodeEntity {
                        kind: EntityKind::Class,
                        name: class_name.clone(),
                        start_line: child.start_position().row + 1,
                        end_line: child.end_position().row + 1,
                        parent: None,
                    });
                    if let Some(body) = child.child_by_field_name("body") {
                        walk(&body, source, Some(&class_name), entities);
                    }
                }
            }
            "interface_declaration" | "type_alias_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = source[name_node.byte_range()].to_string();
                    entities.push(CodeEntity {
                        kind: EntityKind::Class,
                        name,
                        start_line: child.start_position().row + 1,
                        end_line: child.end_position().row + 1,
                        parent: None,
                    });
                }
            }
            "method_definition" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = source[name_node.byte_range()].to_string();
                    entities.push(CodeEntity {
                        kind: EntityKind::Method,
                        name,
                        start_line: child.start_position().row + 1,
                        end_line: child.end_position().row + 1,
                        parent: parent.map(String::from),
                    });
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut inner = child.walk();
                for decl in child.children(&mut inner) {
                    if decl.kind() != "variable_declarator" {
                        continue;
                    }
                    let has_fn = has_child_kind(&decl, "arrow_function")
                        || has_child_kind(&decl, "function");
                    if !has_fn {
                        continue;
                    }
                    if let Some(name_node) = decl.child_by_field_name("name") {
                        let name = source[name_node.byte_range()].to_string();
                        entities.push(CodeEntity {
                            kind: if parent.is_some() { EntityKind::Method } else { EntityKind::Function },
                            name,
                            start_line: child.start_position().row + 1,
                            end_line: child.end_position().row + 1,
                            parent: parent.map(String::from),
                        });
                    }
                }
            }
            "export_statement" => walk(&child, source, parent, entities),
            _ => {
                if parent.is_none() {
                    walk(&child, source, None, entities);
                }
            }
        }
    }
}

fn has_child_kind(node: &tree_sitter::Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| c.kind() == kind)
}

pub(crate) fn collect_imports(
    node: &tree_sitter::Node,
    source: &str,
    imports: &mut Vec<ImportStatement>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_statement" => {
                if let Some(source_node) = child.child_by_field_name("source") {
                    let module = strip_quotes(&source[source_node.byte_range()]);
                    if !module.is_empty() {
                        imports.push(ImportStatement { module });
                    }
                }
            }
            "call_expression" => {
                // require("module")
                if let Some(fn_node) = child.child_by_field_name("function") {
                    if &source[fn_node.byte_range()] == "require" {
                        if let Some(args) = child.child_by_field_name("arguments") {
                            let mut acursor = args.walk();
                            if let Some(arg) = args.children(&mut acursor).find(|a| a.kind() == "string") {
                                let module = strip_quotes(&source[arg.byte_range()]);
                                if !module.is_empty() {
                                    imports.push(ImportStatement { module });
                                }
                            }
                        }
                    }
                }
                collect_imports(&child, source, imports);
            }
            _ => collect_imports(&child, source, imports),
        }
    }
}

fn strip_quotes(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extracts_function_class_and_arrow() {
        let src = "function greet() {}\nclass Logger {\n  log() {}\n}\nconst add = (a, b) => a + b;\n";
        let (entities, _) = extract(&PathBuf::from("a.js"), src);
        assert!(entities.iter().any(|e| e.name == "greet" && e.kind == EntityKind::Function));
        assert!(entities.iter().any(|e| e.name == "Logger" && e.kind == EntityKind::Class));
        assert!(entities.iter().any(|e| e.name == "log" && e.kind == EntityKind::Method));
        assert!(entities.iter().any(|e| e.name == "add" && e.kind == EntityKind::Function));
    }

    #[test]
    fn extracts_import_source() {
        let src = "import { greet } from './main';\n";
        let (_, imports) = extract(&PathBuf::from("a.js"), src);
        assert_eq!(imports[0].module, "./main");
    }
}
