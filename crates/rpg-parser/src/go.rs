//! Go entity and import extraction via tree-sitter.

use crate::adapter::{CodeEntity, EntityKind, ImportStatement};
use std::path::Path;

pub fn extract(path: &Path, source: &str) -> (Vec<CodeEntity>, Vec<ImportStatement>) {
    let lang: tree_sitter::Language = tree_sitter_go::LANGUAGE.into();
    let mut parser = tree_sitter::Parser::new();
    if parser.set_language(&lang).is_err() {
        return (Vec::new(), Vec::new());
    }
    let Some(tree) = parser.parse(source.as_bytes(), None) else {
        return (Vec::new(), Vec::new());
    };
    let _ = path;

    let root = tree.root_node();
    let mut entities = Vec::new();
    let mut imports = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "function_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    entities.push(CodeEntity {
                        kind: EntityKind::Function,
                        name: source[name_node.byte_range()].to_string(),
                        start_line: child.start_position().row + 1,
                        end_line: child.end_position().row + 1,
                        parent: None,
                    });
                }
            }
            "method_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let receiver = receiver_type(&child, source);
                    entities.push(CodeEntity {
                        kind: EntityKind::Method,
                        name: source[name_node.byte_range()].to_string(),
                        start_line: child.start_position().row + 1,
                        end_line: child.end_position().row + 1,
                        parent: receiver,
                    });
                }
            }
            "type_declaration" => {
                let mut tc = child.walk();
                for spec in child.children(&mut tc) {
                    if spec.kind() == "type_spec" {
                        if let Some(name_node) = spec.child_by_field_name("name") {
                            entities.push(CodeEntity {
                                kind: EntityKind::Class,
                                name: source[name_node.byte_range()].to_string(),
                                start_line: spec.start_position().row + 1,
                                end_line: spec.end_position().row + 1,
                                parent: None,
                            });
                        }
                    }
                }
            }
            "import_declaration" => collect_imports(&child, source, &mut imports),
            _ => {}
        }
    }
    (entities, imports)
}

fn receiver_type(node: &tree_sitter::Node, source: &str) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    let pd = receiver
        .children(&mut cursor)
        .find(|n| n.kind() == "parameter_declaration")?;
    let t = pd.child_by_field_name("type")?;
    Some(source[t.byte_range()].trim_start_matches('*').to_string())
}

fn collect_imports(node: &tree_sitter::Node, source: &str, imports: &mut Vec<ImportStatement>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_spec" => {
                if let Some(path_node) = child.child_by_field_name("path") {
                    let module = source[path_node.byte_range()].trim_matches('"').to_string();
                    imports.push(ImportStatement { module });
                }
            }
            "import_spec_list" => collect_imports(&child, source, imports),
            "interpreted_string_literal" => {
                let module = source[child.byte_range()].trim_matches('"').to_string();
                imports.push(ImportStatement { module });
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extracts_function_method_and_type() {
        let src = "package main\n\ntype Logger struct{}\n\nfunc (l *Logger) Log() {}\n\nfunc main() {}\n";
        let (entities, _) = extract(&PathBuf::from("a.go"), src);
        assert!(entities.iter().any(|e| e.name == "Logger" && e.kind == EntityKind::Class));
        assert!(entities.iter().any(|e| e.name == "Log" && e.kind == EntityKind::Method && e.parent.as_deref() == Some("Logger")));
        assert!(entities.iter().any(|e| e.name == "main" && e.kind == EntityKind::Function));
    }

    #[test]
    fn extracts_grouped_imports() {
        let src = "package main\n\nimport (\n\t\"fmt\"\n\t\"os\"\n)\n";
        let (_, imports) = extract(&PathBuf::from("a.go"), src);
        let modules: Vec<_> = imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["fmt", "os"]);
    }
}
