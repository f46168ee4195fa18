//! Per-language tree-sitter grammar resolution and node-type tables.
//!
//! Grounded in `original_source/src/memory/python_parser.py`
//! (`LANGUAGE_MODULES`, `FUNCTION_NODES`, `CLASS_NODES`): one generic
//! table-driven walker rather than a bespoke implementation per language.

use crate::types::Language;

pub fn tree_sitter_language(language: Language) -> Option<tree_sitter::Language> {
    match language {
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        Language::Javascript => Some(tree_sitter_javascript::LANGUAGE.into()),
        Language::Typescript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
        Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
        Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
        Language::C => Some(tree_sitter_c::LANGUAGE.into()),
        Language::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
        Language::Php => Some(tree_sitter_php::LANGUAGE_PHP.into()),
        Language::Ruby => Some(tree_sitter_ruby::LANGUAGE.into()),
        Language::Swift => Some(tree_sitter_swift::LANGUAGE.into()),
        Language::Kotlin => Some(tree_sitter_kotlin_ng::LANGUAGE.into()),
        Language::Sql | Language::Json | Language::Yaml | Language::Toml | Language::Unknown => None,
    }
}

/// Node kinds that are emitted as `unit_type=function` when encountered as
/// freestanding, or `unit_type=method` when nested inside a class node.
pub fn function_nodes(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python => &["function_definition", "async_function_definition"],
        Language::Javascript | Language::Typescript => {
            &["function_declaration", "arrow_function", "function_expression", "method_definition"]
        }
        Language::Java => &["method_declaration"],
        Language::Go => &["function_declaration", "method_declaration"],
        Language::Rust => &["function_item"],
        Language::C => &["function_definition"],
        Language::Cpp => &["function_definition"],
        Language::Php => &["function_definition", "method_declaration"],
        Language::Ruby => &["method", "singleton_method"],
        Language::Swift => &["function_declaration"],
        Language::Kotlin => &["function_declaration"],
        Language::Sql | Language::Json | Language::Yaml | Language::Toml | Language::Unknown => &[],
    }
}

/// Node kinds that are emitted as `unit_type=class`.
pub fn class_nodes(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python => &["class_definition"],
        Language::Javascript => &["class_declaration"],
        Language::Typescript => &["class_declaration", "interface_declaration"],
        Language::Java => &["class_declaration", "interface_declaration"],
        Language::Go => &["type_declaration"],
        Language::Rust => &["struct_item", "impl_item", "trait_item"],
        Language::C => &["struct_specifier"],
        Language::Cpp => &["class_specifier", "struct_specifier", "namespace_definition"],
        Language::Php => &["class_declaration", "interface_declaration", "trait_declaration"],
        Language::Ruby => &["class", "module"],
        Language::Swift => &["class_declaration", "struct_declaration", "protocol_declaration"],
        Language::Kotlin => &["class_declaration", "object_declaration", "interface_declaration"],
        Language::Sql | Language::Json | Language::Yaml | Language::Toml | Language::Unknown => &[],
    }
}
