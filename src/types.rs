//! Core data model: semantic units, file records, and the language enum.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Closed set of languages the parser registry understands.
///
/// `Unknown` is returned for unrecognized extensions — this is not an
/// error, it just means the parse result carries zero units.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Java,
    Go,
    Rust,
    C,
    Cpp,
    Php,
    Ruby,
    Swift,
    Kotlin,
    Sql,
    Json,
    Yaml,
    Toml,
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Javascript => "javascript",
            Self::Typescript => "typescript",
            Self::Java => "java",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Php => "php",
            Self::Ruby => "ruby",
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Sql => "sql",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Unknown => "unknown",
        }
    }

    /// Resolve a language from a file extension (without the leading dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "py" | "pyi" => Self::Python,
            "js" | "jsx" | "mjs" | "cjs" => Self::Javascript,
            "ts" | "tsx" => Self::Typescript,
            "java" => Self::Java,
            "go" => Self::Go,
            "rs" => Self::Rust,
            "c" | "h" => Self::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => Self::Cpp,
            "php" => Self::Php,
            "rb" => Self::Ruby,
            "swift" => Self::Swift,
            "kt" | "kts" => Self::Kotlin,
            "sql" => Self::Sql,
            "json" => Self::Json,
            "yml" | "yaml" => Self::Yaml,
            "toml" => Self::Toml,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of a semantic unit.
///
/// `Section` covers configuration keys (JSON/YAML/TOML top-level entries)
/// and SQL DDL; CREATE TABLE/VIEW are classified as `Class`, not `Section`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitType {
    Function,
    Class,
    Method,
    Section,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Section => "section",
        }
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maximum length (in bytes) of a unit's `signature` field.
pub const SIGNATURE_MAX_LEN: usize = 200;

/// An atomic indexable entity: a function, class, method, or config section.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SemanticUnit {
    pub unit_type: UnitType,
    pub name: String,
    pub language: Language,
    pub file_path: String,
    /// 1-based inclusive line range.
    pub start_line: u32,
    pub end_line: u32,
    /// 0-based byte offsets into the file content.
    pub start_byte: u32,
    pub end_byte: u32,
    /// First <= SIGNATURE_MAX_LEN characters of the unit's source.
    pub signature: String,
    /// Exact bytes of the unit (as UTF-8 text).
    pub content: String,
    /// SHA-256 hex digest of the normalized (trim-trailing-whitespace) content.
    pub content_hash: String,
}

impl SemanticUnit {
    /// Build a unit from its raw text, deriving `signature` and `content_hash`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        unit_type: UnitType,
        name: impl Into<String>,
        language: Language,
        file_path: impl Into<String>,
        start_line: u32,
        end_line: u32,
        start_byte: u32,
        end_byte: u32,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let signature = truncate_chars(&content, SIGNATURE_MAX_LEN);
        let content_hash = hash_unit_content(&content);
        Self {
            unit_type,
            name: name.into(),
            language,
            file_path: file_path.into(),
            start_line,
            end_line,
            start_byte,
            end_byte,
            signature,
            content,
            content_hash,
        }
    }

    /// Stable id for this unit among `siblings_before` same-name siblings in
    /// its parent scope (the "disambiguator" from the indexer's id policy).
    pub fn stable_id(&self, disambiguator: u32) -> String {
        stable_unit_id(&self.file_path, self.unit_type, &self.name, disambiguator)
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// SHA-256 of the content after trimming trailing whitespace from each line
/// (the normalization spec.md §3 requires for `content_hash`).
pub fn hash_unit_content(content: &str) -> String {
    let normalized: String = content
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// SHA-256 of raw file bytes — the cache key.
pub fn hash_file_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// `hash(file_path || unit_type || name || disambiguator)` — never reassigned
/// across reindex for an unchanged unit, which is what makes vector-store
/// upserts idempotent.
pub fn stable_unit_id(file_path: &str, unit_type: UnitType, name: &str, disambiguator: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update(b"\0");
    hasher.update(unit_type.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(name.as_bytes());
    hasher.update(b"\0");
    hasher.update(disambiguator.to_le_bytes());
    hex::encode(hasher.finalize())
}

/// Per-file bookkeeping owned by the indexer: one `FileRecord` owns zero or
/// more `SemanticUnit`s (by id, not by value — units live in the index).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FileRecord {
    pub file_path: String,
    pub file_hash: String,
    pub language: Language,
    pub last_indexed_at: u64,
    pub unit_names: Vec<String>,
    /// Stable ids of the units currently owned by this file, in the order
    /// they were parsed (doubles as the disambiguator source for same-name
    /// siblings: index into this vec == occurrence count at parse time).
    pub unit_ids: Vec<String>,
}

/// Minimal hex encoding so we don't pull in a separate `hex` crate on top of
/// `sha2` for a handful of call sites.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use std::fmt::Write;
        let mut s = String::with_capacity(bytes.as_ref().len() * 2);
        for b in bytes.as_ref() {
            let _ = write!(s, "{:02x}", b);
        }
        s
    }
}
