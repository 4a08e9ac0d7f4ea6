//! Java entity and import extraction via tree-sitter.

use crate::adapter::{CodeEntity, EntityKind, ImportStatement};
use std::path::Path;

pub fn extract(path: &Path, source: &str) -> (Vec<CodeEntity>, Vec<ImportStatement>) {
    let lang: tree_sitter::Language = tree_sitter_java::LANGUAGE.into();
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
            "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let class_name = source[name_node.byte_range()].to_string();
                    entities.push(CodeEntity {
                        kind: EntityKind::Class,
                        name: class_name.clone(),
                        start_line: child.start_position().row + 1,
                        end_line: child.end_position().row + 1,
                        parent: parent.map(String::from),
                    });
                    if let Some(body) = child.child_by_field_name("body") {
                        walk(&body, source, Some(&class_name), entities);
                    }
                }
            }
            "method_declaration" | "constructor_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    entities.push(CodeEntity {
                        kind: EntityKind::Method,
                        name: source[name_node.byte_range()].to_string(),
                        start_line: child.start_position().row + 1,
                        end_line: child.end_position().row + 1,
                        parent: parent.map(String::from),
                    });
                }
            }
            _ => walk(&child, source, parent, entities),
        }
    }
}

fn collect_imports(node: &tree_sitter::Node, source: &str, imports: &mut Vec<ImportStatement>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_declaration" {
            let text = source[child.byte_range()].trim().to_string();
            let module = text
                .trim_start_matches("import ")
                .trim_start_matches("static ")
                .trim_end_matches(';')
                .trim()
                .to_string();
            if !module.is_empty() {
                imports.push(ImportStatement { module });
            }
        } else {
            collect_imports(&child, source, imports);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extracts_class_and_method() {
        let src = "import java.util.List;\n\npublic class Logger {\n    public void log() {}\n}\n";
        let (entities, imports) = extract(&PathBuf::from("Logger.java"), src);
        assert!(entities.iter().any(|e| e.name == "Logger" && e.kind == EntityKind::Class));
        assert!(entities.iter().any(|e| e.name == "log" && e.kind == EntityKind::Method));
        assert_eq!(imports[0].module, "java.util.List");
    }
}
