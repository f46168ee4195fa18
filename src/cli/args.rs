//! CLI argument structs for all subcommands.

use clap::Parser;

#[derive(Parser, Debug)]
pub struct IndexArgs {
    /// Directory to index
    #[arg(default_value = ".")]
    pub dir: String,

    /// Project name attached to every indexed unit (defaults to the
    /// directory's final path component)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Also skip test/tests/vendor directories (node_modules and .git are
    /// always skipped)
    #[arg(long)]
    pub exclude_test_and_vendor_dirs: bool,

    /// Path to the on-disk cache (content-addressed unit store). Defaults
    /// to a platform data directory (see `cache::default_cache_path`) when
    /// omitted.
    #[arg(long)]
    pub cache: Option<String>,

    /// Path to a TOML config file overriding engine defaults
    #[arg(long)]
    pub config: Option<String>,
}

#[derive(Parser, Debug)]
pub struct SearchArgs {
    /// Query string; supports `lang:`, `file:`, `project:`, `category:`,
    /// `created:`/`modified:` date filters, and `-term` exclusions
    pub query: String,

    /// Path to the on-disk cache built by `codemem index`. Defaults to a
    /// platform data directory (see `cache::default_cache_path`) when omitted.
    #[arg(long)]
    pub cache: Option<String>,

    /// Number of results to return
    #[arg(short = 'k', long, default_value = "10")]
    pub top_k: usize,

    /// Search mode: semantic, keyword, or hybrid
    #[arg(long, default_value = "hybrid")]
    pub mode: String,

    /// Restrict to a project name
    #[arg(long)]
    pub project: Option<String>,

    /// Active project to boost when mixing results across projects
    #[arg(long)]
    pub active_project: Option<String>,

    /// Path to a TOML config file overriding engine defaults
    #[arg(long)]
    pub config: Option<String>,
}

#[derive(Parser, Debug)]
pub struct SuggestArgs {
    /// Path to the on-disk cache built by `codemem index`. Defaults to a
    /// platform data directory (see `cache::default_cache_path`) when omitted.
    #[arg(long)]
    pub cache: Option<String>,

    /// Intent hint: implementation, debugging, learning, exploration, refactoring
    #[arg(long)]
    pub intent: Option<String>,

    /// Restrict project-specific suggestions to this project
    #[arg(long)]
    pub project: Option<String>,

    /// Free-text context used to detect a domain preset (auth, database, api, error)
    #[arg(long)]
    pub context: Option<String>,

    /// Maximum number of suggestions to return
    #[arg(long, default_value = "8")]
    pub max_suggestions: usize,
}

#[derive(Parser, Debug)]
pub struct PruneExpiredArgs {
    /// Path to the JSON memory store file
    #[arg(long, default_value = "codemem.memories.json")]
    pub memory_file: String,

    /// Path to the on-disk cache built by `codemem index`. Defaults to a
    /// platform data directory (see `cache::default_cache_path`) when omitted.
    #[arg(long)]
    pub cache: Option<String>,

    /// Report what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// TTL in hours for SESSION_STATE memories (config default if omitted)
    #[arg(long)]
    pub ttl_hours: Option<u64>,

    /// Skip the 24h safety gate that protects recently-used memories
    #[arg(long)]
    pub no_safety_check: bool,

    /// Path to a TOML config file overriding engine defaults
    #[arg(long)]
    pub config: Option<String>,
}

#[derive(Parser, Debug)]
pub struct PruneStaleArgs {
    /// Path to the JSON memory store file
    #[arg(long, default_value = "codemem.memories.json")]
    pub memory_file: String,

    /// Path to the on-disk cache built by `codemem index`. Defaults to a
    /// platform data directory (see `cache::default_cache_path`) when omitted.
    #[arg(long)]
    pub cache: Option<String>,

    /// Report what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Days unused before a memory is stale-eligible (config default if omitted)
    #[arg(long)]
    pub days_unused: Option<u64>,

    /// Path to a TOML config file overriding engine defaults
    #[arg(long)]
    pub config: Option<String>,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to the on-disk cache built by `codemem index`. Defaults to a
    /// platform data directory (see `cache::default_cache_path`) when omitted.
    #[arg(long)]
    pub cache: Option<String>,
}
