//! JSON/YAML/TOML structured-config parsing: each top-level key or table
//! becomes one `class` unit named after the key, content = the serialized
//! subtree. JSON and TOML are strict (malformed input is a `ParseError`);
//! YAML is best-effort (malformed input yields zero units).

use crate::error::CodeMemError;
use crate::types::{Language, SemanticUnit, UnitType};

fn unit_from_value(
    language: Language,
    file_path: &str,
    key: &str,
    rendered: String,
) -> Option<SemanticUnit> {
    if key.is_empty() {
        return None;
    }
    Some(SemanticUnit::new(
        UnitType::Class,
        key,
        language,
        file_path,
        1,
        rendered.lines().count().max(1) as u32,
        0,
        rendered.len() as u32,
        rendered,
    ))
}

pub fn parse_json(file_path: &str, content: &str) -> Result<Vec<SemanticUnit>, CodeMemError> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| CodeMemError::Parse {
            path: file_path.to_string(),
            language: "json".to_string(),
            message: e.to_string(),
        })?;

    let obj = match value.as_object() {
        Some(obj) => obj,
        None => return Ok(Vec::new()),
    };

    let mut units = Vec::new();
    for (key, subtree) in obj {
        let rendered = serde_json::to_string_pretty(subtree).unwrap_or_default();
        if let Some(unit) = unit_from_value(Language::Json, file_path, key, rendered) {
            units.push(unit);
        }
    }
    Ok(units)
}

pub fn parse_toml(file_path: &str, content: &str) -> Result<Vec<SemanticUnit>, CodeMemError> {
    let value: toml::Value = toml::from_str(content).map_err(|e| CodeMemError::Parse {
        path: file_path.to_string(),
        language: "toml".to_string(),
        message: e.to_string(),
    })?;

    let table = match value.as_table() {
        Some(table) => table,
        None => return Ok(Vec::new()),
    };

    let mut units = Vec::new();
    for (key, subtree) in table {
        let rendered = toml::to_string_pretty(subtree).unwrap_or_default();
        if let Some(unit) = unit_from_value(Language::Toml, file_path, key, rendered) {
            units.push(unit);
        }
    }
    Ok(units)
}

/// Best-effort: malformed YAML yields an empty unit list rather than an
/// error, unlike the strict JSON/TOML paths.
pub fn parse_yaml(file_path: &str, content: &str) -> Vec<SemanticUnit> {
    let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(content) else {
        return Vec::new();
    };
    let Some(mapping) = value.as_mapping() else {
        return Vec::new();
    };

    let mut units = Vec::new();
    for (key, subtree) in mapping {
        let Some(key_str) = key.as_str() else { continue };
        let rendered = serde_yaml::to_string(subtree).unwrap_or_default();
        if let Some(unit) = unit_from_value(Language::Yaml, file_path, key_str, rendered) {
            units.push(unit);
        }
    }
    units
}
