//! CLI layer: argument parsing, command dispatch, and subcommand implementations.

pub mod args;

pub use args::*;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::CodeMemError;
use crate::external::{HashingEmbedder, InMemoryVectorStore};
use crate::indexer::IndexOptions;
use crate::memory::JsonFileMemoryStore;
use crate::metrics::MetricsStore;
use crate::search::{ProjectWeighting, SearchMode, SearchOptions};

/// This CLI ships only the reference in-process `VectorStore`/`Embedder`
/// (see `external.rs`) — a production deployment swaps these for a real
/// embedding model and vector database without touching the engine.
const REFERENCE_EMBEDDING_DIMENSION: usize = 128;

/// Code-aware memory and retrieval engine: semantic parsing, incremental indexing,
/// and hybrid BM25+vector search
#[derive(Parser, Debug)]
#[command(name = "codemem", version, about, after_help = "\
Run 'codemem <COMMAND> --help' for detailed options and examples.")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Walk a directory, parse it into semantic units, and update the cache incrementally
    Index(IndexArgs),

    /// Run a hybrid keyword + semantic search over an indexed cache
    Search(SearchArgs),

    /// Suggest follow-up queries based on intent, domain, and what's indexed
    Suggest(SuggestArgs),

    /// Expire SESSION_STATE memories past their TTL
    PruneExpired(PruneExpiredArgs),

    /// Delete memories unused for longer than a staleness window
    PruneStale(PruneStaleArgs),

    /// Show summary statistics for an indexed cache
    Info(InfoArgs),
}

pub fn run() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Index(args) => cmd_index(args),
        Commands::Search(args) => cmd_search(args),
        Commands::Suggest(args) => cmd_suggest(args),
        Commands::PruneExpired(args) => cmd_prune_expired(args),
        Commands::PruneStale(args) => cmd_prune_stale(args),
        Commands::Info(args) => cmd_info(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Resolves an explicit `--cache` argument, falling back to the platform
/// data directory when the flag was omitted.
fn resolve_cache_path(arg: &Option<String>) -> PathBuf {
    arg.clone().map(PathBuf::from).unwrap_or_else(cache::default_cache_path)
}

fn load_config(path: &Option<String>) -> Result<EngineConfig, CodeMemError> {
    match path {
        Some(path) => EngineConfig::load(Path::new(path)),
        None => Ok(EngineConfig::default()),
    }
}

fn parse_search_mode(mode: &str) -> Result<SearchMode, CodeMemError> {
    match mode.to_lowercase().as_str() {
        "semantic" => Ok(SearchMode::Semantic),
        "keyword" => Ok(SearchMode::Keyword),
        "hybrid" => Ok(SearchMode::Hybrid),
        other => Err(CodeMemError::InvalidArgs(format!(
            "unknown search mode '{other}', expected semantic, keyword, or hybrid"
        ))),
    }
}

fn cmd_index(args: IndexArgs) -> Result<(), CodeMemError> {
    let dir = Path::new(&args.dir);
    if !dir.exists() {
        return Err(CodeMemError::DirNotFound(args.dir.clone()));
    }

    let config = load_config(&args.config)?;
    let cache_path = resolve_cache_path(&args.cache);
    let store = InMemoryVectorStore::new();
    let embedder = HashingEmbedder::new(REFERENCE_EMBEDDING_DIMENSION);
    let metrics = MetricsStore::new();
    let engine = Engine::open(cache_path, &store, &embedder, &metrics, config);

    let project_name = args.project.clone().or_else(|| {
        dir.file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
    });
    let options = IndexOptions {
        project_name,
        exclude_test_and_vendor_dirs: args.exclude_test_and_vendor_dirs,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_cancel = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        handler_cancel.store(true, Ordering::Relaxed);
    })
    .map_err(|e| CodeMemError::InvalidArgs(format!("failed to install Ctrl-C handler: {e}")))?;

    let summary = engine.index(dir, &options, Some(cancel))?;
    engine.save()?;

    eprintln!(
        "Indexed {} files ({} units, {} cache hits, {} cache misses) in {:.3}s",
        summary.files_indexed,
        summary.units_indexed,
        summary.cache_hits,
        summary.cache_misses,
        summary.duration_s
    );
    if !summary.errors.is_empty() {
        eprintln!("{} file(s) reported errors:", summary.errors.len());
        for err in &summary.errors {
            eprintln!("  {err}");
        }
    }
    Ok(())
}

fn cmd_search(args: SearchArgs) -> Result<(), CodeMemError> {
    let config = load_config(&args.config)?;
    let cache_path = resolve_cache_path(&args.cache);
    let store = InMemoryVectorStore::new();
    let embedder = HashingEmbedder::new(REFERENCE_EMBEDDING_DIMENSION);
    let metrics = MetricsStore::new();
    let engine = Engine::open(cache_path, &store, &embedder, &metrics, config.clone());

    let project_weighting = args.active_project.clone().map(|active_project| ProjectWeighting {
        active_project,
        active_boost: config.hybrid_search.active_project_weight,
        other_boost: config.hybrid_search.other_project_weight,
        ..ProjectWeighting::default()
    });
    let options = SearchOptions {
        top_k: args.top_k,
        mode: parse_search_mode(&args.mode)?,
        project: args.project.clone(),
        project_weighting,
    };

    let response = engine.search(&args.query, &options)?;
    for (rank, item) in response.results.iter().enumerate() {
        println!(
            "{:>3}. [{:.4}] {} {} ({}) — {}",
            rank + 1,
            item.score,
            item.unit_type,
            item.name,
            item.language,
            item.file_path
        );
    }
    eprintln!("\n{}", response.summary);
    for hint in &response.hints {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

fn cmd_suggest(args: SuggestArgs) -> Result<(), CodeMemError> {
    let cache_path = resolve_cache_path(&args.cache);
    let store = InMemoryVectorStore::new();
    let embedder = HashingEmbedder::new(REFERENCE_EMBEDDING_DIMENSION);
    let metrics = MetricsStore::new();
    let engine = Engine::open(cache_path, &store, &embedder, &metrics, EngineConfig::default());

    let response = engine.suggest_queries(
        args.intent.as_deref(),
        args.project.as_deref(),
        args.context.as_deref(),
        args.max_suggestions,
    );

    for suggestion in &response.suggestions {
        println!("[{}] {} — {}", suggestion.category.as_str(), suggestion.query, suggestion.description);
    }
    eprintln!(
        "\n{} files / {} units indexed across {} language(s)",
        response.indexed_stats.total_files,
        response.indexed_stats.total_units,
        response.indexed_stats.languages.len()
    );
    Ok(())
}

fn cmd_prune_expired(args: PruneExpiredArgs) -> Result<(), CodeMemError> {
    let config = load_config(&args.config)?;
    let cache_path = resolve_cache_path(&args.cache);
    let store = JsonFileMemoryStore::open(&args.memory_file)?;
    let vector_store = InMemoryVectorStore::new();
    let embedder = HashingEmbedder::new(REFERENCE_EMBEDDING_DIMENSION);
    let metrics = MetricsStore::new();
    let engine = Engine::open(cache_path, &vector_store, &embedder, &metrics, config);

    let result = engine.prune_expired(&store, args.dry_run, args.ttl_hours, !args.no_safety_check);
    report_prune_result(&result, args.dry_run);
    Ok(())
}

fn cmd_prune_stale(args: PruneStaleArgs) -> Result<(), CodeMemError> {
    let config = load_config(&args.config)?;
    let cache_path = resolve_cache_path(&args.cache);
    let store = JsonFileMemoryStore::open(&args.memory_file)?;
    let vector_store = InMemoryVectorStore::new();
    let embedder = HashingEmbedder::new(REFERENCE_EMBEDDING_DIMENSION);
    let metrics = MetricsStore::new();
    let engine = Engine::open(cache_path, &vector_store, &embedder, &metrics, config);

    let result = engine.prune_stale(&store, args.days_unused, args.dry_run);
    report_prune_result(&result, args.dry_run);
    Ok(())
}

fn report_prune_result(result: &crate::memory::PruneResult, dry_run: bool) {
    let verb = if dry_run { "would delete" } else { "deleted" };
    eprintln!(
        "scanned {} memories, {verb} {}",
        result.memories_scanned, result.memories_deleted
    );
    for err in &result.errors {
        eprintln!("  warning: {err}");
    }
}

fn cmd_info(args: InfoArgs) -> Result<(), CodeMemError> {
    let cache_path = resolve_cache_path(&args.cache);
    let store = InMemoryVectorStore::new();
    let embedder = HashingEmbedder::new(REFERENCE_EMBEDDING_DIMENSION);
    let metrics = MetricsStore::new();
    let engine = Engine::open(cache_path.clone(), &store, &embedder, &metrics, EngineConfig::default());

    let stats = engine.suggest_queries(None, None, None, 0).indexed_stats;
    println!("cache: {}", cache_path.display());
    println!("files: {}", stats.total_files);
    println!("units: {}", stats.total_units);
    println!("languages:");
    for (language, count) in &stats.languages {
        println!("  {language}: {count}");
    }
    if !stats.top_classes.is_empty() {
        println!("top classes: {}", stats.top_classes.join(", "));
    }
    Ok(())
}
