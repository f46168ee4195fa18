//! Top-level facade: the four programmatic entry points
//! (`index`/`search`/`suggest_queries`/`prune_expired`) wired over the
//! indexer, hybrid search, query suggester, and memory pruner.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::cache;
use crate::change::ChangeDetector;
use crate::config::EngineConfig;
use crate::error::CodeMemError;
use crate::external::{Embedder, VectorStore};
use crate::indexer::{IndexOptions, IndexSummary, Indexer};
use crate::memory::{MemoryStore, PruneResult, Pruner};
use crate::metrics::MetricsStore;
use crate::search::{self, SearchOptions, SearchResponse};
use crate::suggest::{self, SuggestQueryResponse};

pub struct Engine<'a, V: VectorStore, E: Embedder> {
    indexer: Indexer<'a, V, E>,
    config: EngineConfig,
    cache_path: PathBuf,
}

impl<'a, V: VectorStore, E: Embedder> Engine<'a, V, E> {
    /// Load persisted cache state from `cache_path` (or start empty) and
    /// build the engine around it.
    pub fn open(
        cache_path: impl Into<PathBuf>,
        vector_store: &'a V,
        embedder: &'a E,
        metrics: &'a MetricsStore,
        config: EngineConfig,
    ) -> Self {
        let cache_path = cache_path.into();
        let state = cache::load_or_default(&cache_path);
        let bm25 = crate::bm25::Bm25Index::new(&config.bm25);
        let indexer = Indexer::new(
            vector_store,
            embedder,
            metrics,
            config.indexer.clone(),
            config.change_detector.clone(),
            config.retry.clone(),
            bm25,
            state,
        );
        Self { indexer, config, cache_path }
    }

    /// Persist the current cache + file index to `cache_path`. Callers
    /// are responsible for calling this after `index()` runs they want
    /// durable — an aborted run's partial progress is still valid state
    /// to persist.
    pub fn save(&self) -> Result<(), CodeMemError> {
        cache::save(&self.cache_path, &self.indexer.snapshot_state())
    }

    pub fn index(
        &self,
        directory: &Path,
        options: &IndexOptions,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<IndexSummary, CodeMemError> {
        self.indexer.index(directory, options, cancel)
    }

    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse, CodeMemError> {
        let catalog = self.indexer.catalog_snapshot(options.project.as_deref());
        self.indexer.with_bm25(|bm25| {
            search::search(
                query,
                options,
                &self.config.hybrid_search,
                self.indexer.embedder(),
                self.indexer.vector_store(),
                bm25,
                &catalog,
            )
        })
    }

    pub fn suggest_queries(
        &self,
        intent: Option<&str>,
        project_name: Option<&str>,
        context: Option<&str>,
        max_suggestions: usize,
    ) -> SuggestQueryResponse {
        let state = self.indexer.snapshot_state();
        suggest::suggest_queries(&state, project_name, intent, context, max_suggestions)
    }

    /// Prune expired/stale memories against an external `MemoryStore`.
    /// The engine owns the code index, not the memory store, so callers
    /// supply one per call the way the teacher's CLI threads a backend
    /// handle through each subcommand.
    pub fn prune_expired(
        &self,
        store: &dyn MemoryStore,
        dry_run: bool,
        ttl_hours: Option<u64>,
        safety_check: bool,
    ) -> PruneResult {
        let mut pruner = Pruner::new(self.config.memory_lifecycle.clone(), store);
        pruner.prune_expired(dry_run, ttl_hours, safety_check)
    }

    pub fn prune_stale(&self, store: &dyn MemoryStore, days_unused: Option<u64>, dry_run: bool) -> PruneResult {
        let mut pruner = Pruner::new(self.config.memory_lifecycle.clone(), store);
        pruner.prune_stale(days_unused, dry_run)
    }

    pub fn new_change_detector(&self) -> ChangeDetector {
        ChangeDetector::new(self.config.change_detector.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{HashingEmbedder, InMemoryVectorStore};
    use tempfile::tempdir;

    #[test]
    fn index_then_search_finds_indexed_function() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("auth.py"), "def authenticate_user():\n    pass\n").unwrap();

        let store = InMemoryVectorStore::new();
        let embedder = HashingEmbedder::new(32);
        let metrics = MetricsStore::new();
        let cache_path = dir.path().join("cache.bin");
        let engine = Engine::open(&cache_path, &store, &embedder, &metrics, EngineConfig::default());

        let summary = engine.index(dir.path(), &IndexOptions::default(), None).unwrap();
        assert_eq!(summary.files_indexed, 1);

        let response = engine.search("authenticate_user", &SearchOptions::default()).unwrap();
        assert!(response.results.iter().any(|r| r.name == "authenticate_user"));
    }

    #[test]
    fn suggest_queries_reflects_indexed_content() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("user.py"), "class UserRepository:\n    pass\n").unwrap();

        let store = InMemoryVectorStore::new();
        let embedder = HashingEmbedder::new(32);
        let metrics = MetricsStore::new();
        let cache_path = dir.path().join("cache.bin");
        let engine = Engine::open(&cache_path, &store, &embedder, &metrics, EngineConfig::default());
        engine.index(dir.path(), &IndexOptions::default(), None).unwrap();

        let response = engine.suggest_queries(None, None, None, 8);
        assert_eq!(response.indexed_stats.total_files, 1);
        assert!(response.indexed_stats.top_classes.contains(&"UserRepository".to_string()));
    }

    #[test]
    fn save_then_reopen_restores_cache_state() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def foo():\n    pass\n").unwrap();

        let store = InMemoryVectorStore::new();
        let embedder = HashingEmbedder::new(32);
        let metrics = MetricsStore::new();
        let cache_path = dir.path().join("cache.bin");

        {
            let engine = Engine::open(&cache_path, &store, &embedder, &metrics, EngineConfig::default());
            engine.index(dir.path(), &IndexOptions::default(), None).unwrap();
            engine.save().unwrap();
        }

        let reopened = Engine::open(&cache_path, &store, &embedder, &metrics, EngineConfig::default());
        let second_summary = reopened.index(dir.path(), &IndexOptions::default(), None).unwrap();
        assert_eq!(second_summary.cache_hits, 1);
    }
}
