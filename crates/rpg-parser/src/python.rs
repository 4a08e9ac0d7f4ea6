//! Python entity and import extraction via tree-sitter.

use crate::adapter::{CodeEntity, EntityKind, ImportStatement};
use std::path::Path;

pub fn extract(path: &Path, source: &str) -> (Vec<CodeEntity>, Vec<ImportStatement>) {
    let lang: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
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
    collect_imports(&tree.root_node(), source, &mut imports);

    (entities, imports)
}

fn walk(node: &tree_sitter::Node, source: &str, parent: Option<&str>, entities: &mut Vec<CodeEntity>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" => {
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
            "decorated_definition" => {
                walk(&child, source, parent, entities);
            }
            "class_definition" => {
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
            _ => {
                if parent.is_none() {
                    walk(&child, source, None, entities);
                }
            }
        }
    }
}

fn collect_imports(root: &tree_sitter::Node, source: &str, imports: &mut Vec<ImportStatement>) {
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "import_statement" | "import_from_statement" => {
                let text = &source[child.byte_range()];
                if let Some(module) = parse_import(text) {
                    imports.push(ImportStatement { module });
                }
            }
            _ => collect_imports(&child, source, imports),
        }
    }
}

fn parse_import(text: &str) -> Option<String> {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("from ") {
        let module = rest.splitn(2, " import ").next().unwrap_or("").trim();
        if module.is_empty() {
            return None;
        }
        return Some(module.to_string());
    }
    if let Some(rest) = text.strip_prefix("import ") {
        let module = rest.split(" as ").next().unwrap_or("").split(',').next().unwrap_or("").trim();
        if module.is_empty() {
            return None;
        }
        return Some(module.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extracts_function_and_class() {
        let src = "def greet():\n    pass\n\nclass Logger:\n    def log(self):\n        pass\n";
        let (entities, _) = extract(&PathBuf::from("a.py"), src);
        assert_eq!(entities.len(), 3);
        assert!(entities.iter().any(|e| e.name == "greet" && e.kind == EntityKind::Function));
        assert!(entities.iter().any(|e| e.name == "Logger" && e.kind == EntityKind::Class));
        assert!(entities.iter().any(|e| e.name == "log" && e.kind == EntityKind::Method));
    }

    #[test]
    fn extracts_imports() {
        let src = "import os\nfrom typing import List\n";
        let (_, imports) = extract(&PathBuf::from("a.py"), src);
        let modules: Vec<_> = imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["os", "typing"]);
    }
}
