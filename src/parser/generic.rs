//! Generic table-driven AST walker shared by every tree-sitter-backed
//! language. One walker, dispatched through `languages::function_nodes`/
//! `class_nodes`, replaces a bespoke per-language implementation.

use tree_sitter::Node;

use crate::parser::languages::{class_nodes, function_nodes, tree_sitter_language};
use crate::types::{Language, SemanticUnit, UnitType};

const SIGNATURE_MAX_LEN: usize = 200;

pub fn parse(language: Language, file_path: &str, content: &str) -> Option<Vec<SemanticUnit>> {
    let ts_language = tree_sitter_language(language)?;
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&ts_language).ok()?;
    let tree = parser.parse(content, None)?;

    let mut units = Vec::new();
    walk(
        tree.root_node(),
        content,
        language,
        file_path,
        function_nodes(language),
        class_nodes(language),
        false,
        &mut units,
    );
    Some(units)
}

#[allow(clippy::too_many_arguments)]
fn walk(
    node: Node,
    content: &str,
    language: Language,
    file_path: &str,
    fn_kinds: &[&str],
    class_kinds: &[&str],
    inside_class: bool,
    units: &mut Vec<SemanticUnit>,
) {
    let kind = node.kind();

    if class_kinds.contains(&kind) {
        if let Some(unit) = extract_unit(node, content, language, file_path, UnitType::Class, class_name) {
            units.push(unit);
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            walk(child, content, language, file_path, fn_kinds, class_kinds, true, units);
        }
        return;
    }

    if fn_kinds.contains(&kind) {
        let unit_type = if inside_class { UnitType::Method } else { UnitType::Function };
        if let Some(unit) = extract_unit(node, content, language, file_path, unit_type, function_name) {
            units.push(unit);
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, content, language, file_path, fn_kinds, class_kinds, inside_class, units);
    }
}

fn extract_unit(
    node: Node,
    content: &str,
    language: Language,
    file_path: &str,
    unit_type: UnitType,
    name_fn: fn(Node, &str) -> Option<String>,
) -> Option<SemanticUnit> {
    let name = name_fn(node, content)?;
    if name.is_empty() {
        return None;
    }
    let text = node.utf8_text(content.as_bytes()).ok()?;
    let signature: String = text.lines().next().unwrap_or("").chars().take(SIGNATURE_MAX_LEN).collect();
    let unit = SemanticUnit {
        unit_type,
        name,
        language,
        file_path: file_path.to_string(),
        start_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
        start_byte: node.start_byte() as u32,
        end_byte: node.end_byte() as u32,
        signature,
        content: text.to_string(),
        content_hash: crate::types::hash_unit_content(text),
    };
    Some(unit)
}

/// Functions: the name is whichever direct child is a plain `identifier`
/// (falls back to `name`/`field_identifier` for grammars that use a field
/// name instead, e.g. Go's `method_declaration`).
fn function_name(node: Node, content: &str) -> Option<String> {
    if let Some(name_node) = node.child_by_field_name("name") {
        return node_text(name_node, content);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(child.kind(), "identifier" | "field_identifier" | "simple_identifier") {
            return node_text(child, content);
        }
    }
    None
}

/// Classes: prefer a `type_identifier` (Rust/Go/C-family), then any plain
/// `identifier`.
fn class_name(node: Node, content: &str) -> Option<String> {
    if let Some(name_node) = node.child_by_field_name("name") {
        return node_text(name_node, content);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(child.kind(), "type_identifier" | "identifier" | "constant") {
            return node_text(child, content);
        }
    }
    None
}

fn node_text(node: Node, content: &str) -> Option<String> {
    node.utf8_text(content.as_bytes()).ok().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_function_and_class_extracted() {
        let src = "def foo(x):\n    return x\n\nclass Bar:\n    def method(self):\n        pass\n";
        let units = parse(Language::Python, "a.py", src).unwrap();
        let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
        assert!(names.contains(&"foo"));
        assert!(names.contains(&"Bar"));
        assert!(names.contains(&"method"));
        let method = units.iter().find(|u| u.name == "method").unwrap();
        assert_eq!(method.unit_type, UnitType::Method);
        let foo = units.iter().find(|u| u.name == "foo").unwrap();
        assert_eq!(foo.unit_type, UnitType::Function);
    }

    #[test]
    fn rust_function_struct_impl_extracted() {
        let src = "struct Foo;\n\nimpl Foo {\n    fn bar(&self) {}\n}\n\nfn standalone() {}\n";
        let units = parse(Language::Rust, "a.rs", src).unwrap();
        let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
        assert!(names.contains(&"Foo"));
        assert!(names.contains(&"standalone"));
    }

    #[test]
    fn parse_is_deterministic() {
        let src = "def foo(): pass\n";
        let a = parse(Language::Python, "a.py", src).unwrap();
        let b = parse(Language::Python, "a.py", src).unwrap();
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].content_hash, b[0].content_hash);
    }
}
