//! Best-effort SQL DDL extraction: CREATE TABLE/VIEW as `class`, CREATE
//! FUNCTION/PROCEDURE as `function`. Dialect coverage is inherently
//! incomplete — absence of a match is not an error.
//!
//! Grounded in the teacher's `definitions/parser_sql.rs` (`walk_sql_node`,
//! `find_sql_object_name`), generalized from the teacher's definition-kind
//! output to `SemanticUnit`.

use tree_sitter::Node;

use crate::types::{Language, SemanticUnit, UnitType};

const SIGNATURE_MAX_LEN: usize = 200;

pub fn parse(file_path: &str, content: &str) -> Vec<SemanticUnit> {
    let ts_language: tree_sitter::Language = tree_sitter_sequel::LANGUAGE.into();
    let mut parser = tree_sitter::Parser::new();
    if parser.set_language(&ts_language).is_err() {
        return Vec::new();
    }
    let Some(tree) = parser.parse(content, None) else {
        return Vec::new();
    };

    let mut units = Vec::new();
    walk(tree.root_node(), content, file_path, &mut units);
    units
}

fn walk(node: Node, content: &str, file_path: &str, units: &mut Vec<SemanticUnit>) {
    let unit_type = match node.kind() {
        // CREATE FUNCTION and CREATE PROCEDURE are both `function` per the
        // unit-type contract; the grammar's procedure/proc wording doesn't
        // need to be distinguished downstream.
        "create_function_statement" | "create_procedure_statement" => Some(UnitType::Function),
        "create_table_statement" | "create_view_statement" => Some(UnitType::Class),
        _ => None,
    };

    if let Some(unit_type) = unit_type {
        if let Some(unit) = extract_named_unit(node, content, file_path, unit_type) {
            units.push(unit);
        }
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, content, file_path, units);
    }
}

fn extract_named_unit(
    node: Node,
    content: &str,
    file_path: &str,
    unit_type: UnitType,
) -> Option<SemanticUnit> {
    let name = find_object_name(node, content)?;
    let text = node.utf8_text(content.as_bytes()).ok()?;
    let signature: String = text.lines().next().unwrap_or("").chars().take(SIGNATURE_MAX_LEN).collect();

    Some(SemanticUnit {
        unit_type,
        name,
        language: Language::Sql,
        file_path: file_path.to_string(),
        start_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
        start_byte: node.start_byte() as u32,
        end_byte: node.end_byte() as u32,
        signature,
        content: text.to_string(),
        content_hash: crate::types::hash_unit_content(text),
    })
}

/// Prefer the grammar's `name` field; fall back to scanning for an
/// identifier-shaped child after the leading keyword run; fall back again
/// to a raw-text keyword scan for dialect variants the grammar doesn't
/// model precisely.
fn find_object_name(node: Node, content: &str) -> Option<String> {
    if let Some(name_node) = node.child_by_field_name("name") {
        return name_node.utf8_text(content.as_bytes()).ok().map(|s| s.to_string());
    }

    let mut found_keyword = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let kind = child.kind();
        if kind.starts_with("keyword_") || kind.to_uppercase() == kind {
            found_keyword = true;
            continue;
        }
        if found_keyword && child.is_named() {
            if let Ok(text) = child.utf8_text(content.as_bytes()) {
                if !text.is_empty() && !text.starts_with('(') && !text.eq_ignore_ascii_case("as") {
                    return Some(text.to_string());
                }
            }
        }
    }

    let text = node.utf8_text(content.as_bytes()).ok()?;
    let upper = text.to_uppercase();
    for keyword in ["PROCEDURE", "PROC", "TABLE", "FUNCTION", "VIEW"] {
        if let Some(pos) = upper.find(keyword) {
            let after = &text[pos + keyword.len()..];
            let name = after
                .trim_start()
                .split(|c: char| c.is_whitespace() || c == '(' || c == '\n' || c == '\r')
                .next()
                .unwrap_or("");
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}
