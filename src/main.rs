//! Code-aware memory and retrieval engine: semantic parsing, incremental
//! indexing, and hybrid BM25+vector search.
//!
//! Binary crate entry point. All CLI logic is in the `cli` module.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    codemem::cli::run();
}
