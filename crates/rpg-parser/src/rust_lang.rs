//! Rust entity and import (`use`) extraction via tree-sitter.

use crate::adapter::{CodeEntity, EntityKind, ImportStatement};
use std::path::Path;

pub fn extract(path: &Path, source: &str) -> (Vec<CodeEntity>, Vec<ImportStatement>) {
    let lang: tree_sitter::Language = tree_sitter_rust::LANGUAGE.into();
    let mut parser = tree_sitter::Parser::new();
    if parser.set_language(&lang).is_err() {
        return (Vec::new(), Vec::new());
    }
    let Some(tree) = parser.parse(source.as_bytes(), None) else {
        return (Vec::new(), Vec::new());
    };
    let _ = path;

    let mut entities = Vec::new();
    walk(&tree.root_node(), source, None, &mut entities);

    let mut imports = Vec::new();
    collect_uses(&tree.root_node(), source, &mut imports);

    (entities, imports)
}

fn walk(node: &tree_sitter::Node, source: &str, parent: Option<&str>, entities: &mut Vec<CodeEntity>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_item" => {
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
            "struct_item" | "enum_item" | "type_item" => {
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
            "impl_item" => {
                if let Some(type_node) = child.child_by_field_name("type") {
                    let type_name = source[type_node.byte_range()].to_string();
                    if let Some(body) = child.child_by_field_name("body") {
                        walk(&body, source, Some(&type_name), entities);
                    }
                }
            }
            "trait_item" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let name = source[name_node.byte_range()].to_string();
                    entities.push(CodeEntity {
                        kind: EntityKind::Class,
                        name: name.clone(),
                        start_line: child.start_position().row + 1,
                        end_line: child.end_position().row + 1,
                        parent: None,
                    });
                    if let Some(body) = child.child_by_field_name("body") {
                        walk(&body, source, Some(&name), entities);
                    }
                }
            }
            "mod_item" => {
                if let Some(body) = child.child_by_field_name("body") {
                    walk(&body, source, parent, entities);
                }
            }
            _ => {
                if parent.is_none() {
                    walk(&child, source, None, entities);
                }
            }
        }
    }
}

fn collect_uses(node: &tree_sitter::Node, source: &str, imports: &mut Vec<ImportStatement>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "use_declaration" {
            let text = source[child.byte_range()].to_string();
            for module in parse_use(&text) {
                imports.push(ImportStatement { module });
            }
        } else {
            collect_uses(&child, source, imports);
        }
    }
}

/// Parse a `use` declaration into one or more module paths, expanding a
/// single trailing brace group (`use a::{b, c};`) but not nested groups.
fn parse_use(text: &str) -> Vec<String> {
    let text = text
        .trim()
        .trim_start_matches("pub(crate) ")
        .trim_start_matches("pub ")
        .trim_start_matches("use ")
        .trim_end_matches(';')
        .trim();

    if let Some(brace_start) = text.find('{') {
        let prefix = text[..brace_start].trim_end_matches("::").to_string();
        let inner = &text[brace_start + 1..text.rfind('}').unwrap_or(text.len())];
        return inner
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                let leaf = s.split(" as ").next().unwrap_or(s).trim();
                if prefix.is_empty() {
                    leaf.to_string()
                } else {
                    format!("{prefix}::{leaf}")
                }
            })
            .collect();
    }

    let module = text.split(" as ").next().unwrap_or(text).trim();
    if module.is_empty() {
        Vec::new()
    } else {
        vec![module.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extracts_fn_and_impl_method() {
        let src = "fn add(a: i32, b: i32) -> i32 { a + b }\nstruct Logger;\nimpl Logger {\n    fn log(&self) {}\n}\n";
        let (entities, _) = extract(&PathBuf::from("a.rs"), src);
        assert!(entities.iter().any(|e| e.name == "add" && e.kind == EntityKind::Function));
        assert!(entities.iter().any(|e| e.name == "Logger" && e.kind == EntityKind::Class));
        assert!(entities.iter().any(|e| e.name == "log" && e.kind == EntityKind::Method && e.parent.as_deref() == Some("Logger")));
    }

    #[test]
    fn expands_brace_group_use() {
        let modules = parse_use("use crate::model::{Node, Edge};");
        assert_eq!(modules, vec!["crate::model::Node", "crate::model::Edge"]);
    }

    #[test]
    fn simple_use() {
        let modules = parse_use("use std::collections::HashMap;");
        assert_eq!(modules, vec!["std::collections::HashMap"]);
    }
}
