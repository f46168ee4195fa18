//! Unified error type for the engine.

use thiserror::Error;

/// All errors that can occur across parsing, indexing, search, and memory
/// lifecycle operations.
#[derive(Error, Debug)]
pub enum CodeMemError {
    /// I/O error (file read/write, directory access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error (bincode cache, JSON/TOML config)
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// A source file could not be decomposed into semantic units.
    ///
    /// Parse failures are per-file and non-fatal to an indexing run — the
    /// file is skipped and this error is recorded against it, not returned
    /// to the caller of `index()`.
    #[error("failed to parse {path} as {language}: {message}")]
    Parse {
        path: String,
        language: String,
        message: String,
    },

    /// The query DSL string could not be parsed.
    #[error("invalid query '{query}': {message}")]
    BadQuery { query: String, message: String },

    /// Invalid regex pattern (query DSL filter values, CLI grep-style flags)
    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The external vector store is unreachable or returned an error.
    ///
    /// Search degrades to keyword-only on this error rather than failing
    /// the whole query; callers that need to know this happened should
    /// check the `degraded` flag on the search response, not this variant.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    /// The on-disk cache failed its magic-byte or schema-version check.
    #[error("cache at {path} is corrupt or from an incompatible schema version: {message}")]
    CorruptCache { path: String, message: String },

    /// The operation was cancelled cooperatively (worker pool shutdown,
    /// CLI Ctrl-C) before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// Directory does not exist.
    #[error("directory does not exist: {0}")]
    DirNotFound(String),

    /// No index found for the given project root.
    #[error("no index found for '{dir}'. Build one first:\n  codemem index {dir}")]
    IndexNotFound { dir: String },

    /// A background worker thread panicked; the panic payload (best-effort
    /// string) is carried so the file that triggered it can be logged.
    #[error("worker panicked while processing {context}: {message}")]
    WorkerPanic { context: String, message: String },

    /// Lock poisoned (a thread panicked while holding it).
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// Mutually exclusive flags or other argument validation error.
    #[error("{0}")]
    InvalidArgs(String),

    /// Configuration file failed to load or validate.
    #[error("invalid configuration at {path}: {message}")]
    InvalidConfig { path: String, message: String },
}
