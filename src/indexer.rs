//! Incremental indexer (component F): walks a tree, maintains the
//! content-hash cache, computes per-file indexing plans via the change
//! detector, and applies them to the BM25 index and the external vector
//! store.
//!
//! Concurrency follows §9's re-architecture cue directly: a path channel
//! feeds a bounded pool of parser workers, a plan channel feeds one
//! writer thread that holds single-writer discipline over the cache,
//! file index, and BM25 index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use ignore::WalkBuilder;
use tracing::{info, warn};

use crate::bm25::Bm25Index;
use crate::cache::{CacheEntry, PersistedState};
use crate::change::{ChangeDetector, ChangeType, FileChange};
use crate::config::{ChangeDetectorConfig, IndexerConfig, RetryConfig};
use crate::error::CodeMemError;
use crate::external::{metadata_keys, Embedder, VectorStore};
use crate::metrics::MetricsStore;
use crate::parser;
use crate::types::{FileRecord, Language, SemanticUnit};

const DEFAULT_EXCLUDED_DIRS: &[&str] = &["node_modules", ".git"];
const OPT_IN_EXCLUDED_DIRS: &[&str] = &["test", "tests", "vendor"];

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub project_name: Option<String>,
    pub exclude_test_and_vendor_dirs: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self { project_name: None, exclude_test_and_vendor_dirs: false }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexSummary {
    pub files_indexed: usize,
    pub units_indexed: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub total_size_bytes: u64,
    pub errors: Vec<String>,
    pub duration_s: f64,
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

struct FileWork {
    path: PathBuf,
    rel_path: String,
}

/// What one parser worker hands the writer thread for a single file.
enum PlanKind {
    /// Nothing changed; `file_index` already matches. `is_new_path` adds
    /// are still pending if this content appeared at a new path.
    CacheHit { new_path_units: Option<(CacheEntry, Vec<SemanticUnit>)> },
    Apply {
        cache_entry: CacheEntry,
        old_units: Vec<SemanticUnit>,
        old_unit_ids: Vec<String>,
        change_type: ChangeType,
    },
    Error(String),
}

struct WorkResult {
    file_path: String,
    file_hash: String,
    language: Language,
    size_bytes: u64,
    kind: PlanKind,
}

fn assign_ids(file_path: &str, units: &[SemanticUnit]) -> Vec<String> {
    let mut seen: HashMap<(crate::types::UnitType, &str), u32> = HashMap::new();
    units
        .iter()
        .map(|u| {
            let key = (u.unit_type, u.name.as_str());
            let disambiguator = *seen.entry(key).and_modify(|n| *n += 1).or_insert(0);
            u.stable_id(disambiguator)
        })
        .collect()
}

fn should_exclude(path: &Path, options: &IndexOptions) -> bool {
    let components: Vec<String> = path.components().map(|c| c.as_os_str().to_string_lossy().to_lowercase()).collect();
    if components.iter().any(|c| DEFAULT_EXCLUDED_DIRS.contains(&c.as_str())) {
        return true;
    }
    if options.exclude_test_and_vendor_dirs && components.iter().any(|c| OPT_IN_EXCLUDED_DIRS.contains(&c.as_str())) {
        return true;
    }
    false
}

/// Orchestrates parsing (A), change detection (B), BM25 (C) and the
/// external vector store into one content-addressed incremental index.
pub struct Indexer<'a, V: VectorStore, E: Embedder> {
    vector_store: &'a V,
    embedder: &'a E,
    metrics: &'a MetricsStore,
    indexer_config: IndexerConfig,
    change_detector_config: ChangeDetectorConfig,
    retry_config: RetryConfig,
    state: Mutex<PersistedState>,
    bm25: Mutex<Bm25Index>,
}

impl<'a, V: VectorStore, E: Embedder> Indexer<'a, V, E> {
    pub fn new(
        vector_store: &'a V,
        embedder: &'a E,
        metrics: &'a MetricsStore,
        indexer_config: IndexerConfig,
        change_detector_config: ChangeDetectorConfig,
        retry_config: RetryConfig,
        bm25: Bm25Index,
        state: PersistedState,
    ) -> Self {
        Self {
            vector_store,
            embedder,
            metrics,
            indexer_config,
            change_detector_config,
            retry_config,
            state: Mutex::new(state),
            bm25: Mutex::new(bm25),
        }
    }

    pub fn snapshot_state(&self) -> PersistedState {
        self.state.lock().expect("lock poisoned").clone()
    }

    pub fn embedder(&self) -> &'a E {
        self.embedder
    }

    pub fn vector_store(&self) -> &'a V {
        self.vector_store
    }

    /// Run `f` against a read snapshot of the BM25 index under its lock.
    /// Used by the search facade, which needs `&Bm25Index` but must not
    /// hold the lock for the duration of a whole query.
    pub fn with_bm25<R>(&self, f: impl FnOnce(&Bm25Index) -> R) -> R {
        let bm25 = self.bm25.lock().expect("lock poisoned");
        f(&bm25)
    }

    /// Build a point-in-time id -> metadata lookup from the current cache
    /// and file index, for use as a `SearchCatalog`.
    pub fn catalog_snapshot(&self, project_name: Option<&str>) -> CatalogSnapshot {
        let state = self.state.lock().expect("lock poisoned");
        let mut entries = HashMap::new();
        for record in state.file_index.values() {
            let Some(cache_entry) = state.cache.get(&record.file_hash) else { continue };
            for (unit, id) in cache_entry.units.iter().zip(record.unit_ids.iter()) {
                entries.insert(
                    id.clone(),
                    crate::search::SearchCatalogEntry {
                        id: id.clone(),
                        language: unit.language.to_string(),
                        unit_type: unit.unit_type.to_string(),
                        name: unit.name.clone(),
                        file_path: record.file_path.clone(),
                        project_name: project_name.map(|s| s.to_string()),
                    },
                );
            }
        }
        CatalogSnapshot { entries }
    }

    /// Index `directory`, returning per-run counters. `cancel`, if given,
    /// is checked between files for cooperative shutdown — in-flight
    /// workers finish their current file before the run exits.
    pub fn index(
        &self,
        directory: &Path,
        options: &IndexOptions,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<IndexSummary, CodeMemError> {
        let started = Instant::now();
        let root = std::fs::canonicalize(directory).unwrap_or_else(|_| directory.to_path_buf());

        let mut builder = WalkBuilder::new(&root);
        builder.hidden(true);
        builder.git_ignore(true);

        let worker_count = if self.indexer_config.worker_threads == 0 {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        } else {
            self.indexer_config.worker_threads
        };

        let mut work = Vec::new();
        for entry in builder.build() {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            if should_exclude(entry.path(), options) {
                continue;
            }
            let rel_path = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            work.push(FileWork { path: entry.path().to_path_buf(), rel_path });
        }

        let (path_tx, path_rx) = mpsc::channel::<FileWork>();
        let path_rx = Arc::new(Mutex::new(path_rx));
        let (plan_tx, plan_rx) = mpsc::channel::<WorkResult>();

        for item in work {
            path_tx.send(item).expect("receiver alive");
        }
        drop(path_tx);

        let summary = Mutex::new(IndexSummary::default());
        let cancel = cancel.unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

        std::thread::scope(|scope| {
            for _ in 0..worker_count {
                let path_rx = Arc::clone(&path_rx);
                let plan_tx = plan_tx.clone();
                let cancel = Arc::clone(&cancel);
                scope.spawn(move || {
                    loop {
                        if cancel.load(Ordering::Relaxed) {
                            break;
                        }
                        let work_item = {
                            let rx = path_rx.lock().expect("lock poisoned");
                            rx.recv()
                        };
                        let Ok(item) = work_item else { break };
                        let result = self.process_file(&item);
                        if plan_tx.send(result).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(plan_tx);

            // Single writer: apply plans to cache/file_index/bm25/vector
            // store in the order they arrive.
            while let Ok(result) = plan_rx.recv() {
                let mut s = summary.lock().expect("lock poisoned");
                s.total_size_bytes += result.size_bytes;
                match self.apply(result, &cancel) {
                    Ok(ApplyOutcome::CacheHit) => {
                        s.files_indexed += 1;
                        s.cache_hits += 1;
                    }
                    Ok(ApplyOutcome::Applied { units_touched }) => {
                        s.files_indexed += 1;
                        s.cache_misses += 1;
                        s.units_indexed += units_touched;
                    }
                    Err(message) => {
                        s.errors.push(message);
                    }
                }
            }
        });

        let mut summary = summary.into_inner().expect("lock poisoned");
        summary.duration_s = started.elapsed().as_secs_f64();

        self.metrics.store_metrics(
            summary.files_indexed,
            summary.duration_s,
            options.project_name.clone(),
            Some(summary.total_size_bytes),
            now_unix(),
        )?;

        info!(
            files_indexed = summary.files_indexed,
            cache_hits = summary.cache_hits,
            errors = summary.errors.len(),
            duration_s = summary.duration_s,
            "indexing run complete"
        );

        Ok(summary)
    }

    /// Worker-side: read, hash, and (if not cached) parse a file, then
    /// decide what the writer needs to apply. Holds no shared lock.
    fn process_file(&self, item: &FileWork) -> WorkResult {
        let read_result = std::fs::read(&item.path);
        let content_bytes = match read_result {
            Ok(bytes) => bytes,
            Err(e) => {
                return WorkResult {
                    file_path: item.rel_path.clone(),
                    file_hash: String::new(),
                    language: Language::Unknown,
                    size_bytes: 0,
                    kind: PlanKind::Error(format!("{}: read failed: {e}", item.rel_path)),
                }
            }
        };
        let size_bytes = content_bytes.len() as u64;
        let file_hash = crate::types::hash_file_bytes(&content_bytes);

        let existing_record = {
            let state = self.state.lock().expect("lock poisoned");
            state.file_index.get(&item.rel_path).cloned()
        };
        let cached_entry = {
            let state = self.state.lock().expect("lock poisoned");
            state.cache.get(&file_hash).cloned()
        };

        if let Some(entry) = cached_entry {
            if let Some(record) = &existing_record {
                if record.file_hash == file_hash {
                    return WorkResult {
                        file_path: item.rel_path.clone(),
                        file_hash,
                        language: entry.language,
                        size_bytes,
                        kind: PlanKind::CacheHit { new_path_units: None },
                    };
                }
            }
            return WorkResult {
                file_path: item.rel_path.clone(),
                file_hash,
                language: entry.language,
                size_bytes,
                kind: PlanKind::CacheHit { new_path_units: Some((entry.clone(), entry.units)) },
            };
        }

        let content = match String::from_utf8(content_bytes) {
            Ok(s) => s,
            Err(e) => {
                return WorkResult {
                    file_path: item.rel_path.clone(),
                    file_hash,
                    language: Language::Unknown,
                    size_bytes,
                    kind: PlanKind::Error(format!("{}: not valid utf-8: {e}", item.rel_path)),
                }
            }
        };

        let timeout = Duration::from_secs(self.indexer_config.per_file_parse_timeout_secs);
        let (tx, rx) = mpsc::channel();
        let parse_rel_path = item.rel_path.clone();
        // Detached, not scoped: a parser that hangs past the timeout must not
        // block the caller. The orphaned thread finishes (or leaks) on its own.
        std::thread::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                parser::parse_source_file(&parse_rel_path, &content)
            }));
            let _ = tx.send(result);
        });
        let parse_result = match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(_) => {
                return WorkResult {
                    file_path: item.rel_path.clone(),
                    file_hash,
                    language: Language::Unknown,
                    size_bytes,
                    kind: PlanKind::Error(format!(
                        "{}: parse exceeded {}s timeout",
                        item.rel_path, self.indexer_config.per_file_parse_timeout_secs
                    )),
                }
            }
        };

        let parsed = match parse_result {
            Ok(Ok(parsed)) => parsed,
            Ok(Err(e)) => {
                return WorkResult {
                    file_path: item.rel_path.clone(),
                    file_hash,
                    language: Language::Unknown,
                    size_bytes,
                    kind: PlanKind::Error(format!("{}: {e}", item.rel_path)),
                }
            }
            Err(_) => {
                return WorkResult {
                    file_path: item.rel_path.clone(),
                    file_hash,
                    language: Language::Unknown,
                    size_bytes,
                    kind: PlanKind::Error(format!("{}: parser panicked", item.rel_path)),
                }
            }
        };

        let old_units = existing_record
            .as_ref()
            .and_then(|r| {
                let state = self.state.lock().expect("lock poisoned");
                state.cache.get(&r.file_hash).cloned()
            })
            .map(|e| e.units)
            .unwrap_or_default();
        let old_unit_ids = existing_record.map(|r| r.unit_ids).unwrap_or_default();

        let change_type = if old_unit_ids.is_empty() { ChangeType::Added } else { ChangeType::Modified };

        WorkResult {
            file_path: item.rel_path.clone(),
            file_hash,
            language: parsed.language,
            size_bytes,
            kind: PlanKind::Apply {
                cache_entry: CacheEntry { language: parsed.language, units: parsed.units },
                old_units,
                old_unit_ids,
                change_type,
            },
        }
    }

    /// Writer-side: single-writer application of one file's plan to the
    /// shared cache/file_index/bm25 and, via retried RPCs, the vector
    /// store.
    fn apply(&self, result: WorkResult, cancel: &Arc<AtomicBool>) -> Result<ApplyOutcome, String> {
        match result.kind {
            PlanKind::Error(message) => Err(message),
            PlanKind::CacheHit { new_path_units: None } => Ok(ApplyOutcome::CacheHit),
            PlanKind::CacheHit { new_path_units: Some((entry, units)) } => {
                let ids = assign_ids(&result.file_path, &units);
                for (unit, id) in units.iter().zip(ids.iter()) {
                    self.upsert_unit(id, unit, &result.file_path)
                        .map_err(|e| format!("{}: {e}", result.file_path))?;
                    self.bm25.lock().expect("lock poisoned").add_document(id.clone(), &unit.content);
                }
                let mut state = self.state.lock().expect("lock poisoned");
                state.file_index.insert(
                    result.file_path.clone(),
                    FileRecord {
                        file_path: result.file_path,
                        file_hash: result.file_hash,
                        language: entry.language,
                        last_indexed_at: now_unix(),
                        unit_names: units.iter().map(|u| u.name.clone()).collect(),
                        unit_ids: ids,
                    },
                );
                Ok(ApplyOutcome::Applied { units_touched: units.len() })
            }
            PlanKind::Apply { cache_entry, old_units, old_unit_ids, change_type } => {
                if cancel.load(Ordering::Relaxed) {
                    return Err(format!("{}: run cancelled before apply", result.file_path));
                }

                let mut detector = ChangeDetector::new(self.change_detector_config.clone());
                let change = FileChange {
                    file_path: result.file_path.clone(),
                    change_type,
                    old_path: None,
                    similarity_ratio: 0.0,
                };
                let plan = detector.get_incremental_index_plan(&change, &old_units, &cache_entry.units);

                let old_id_by_name: HashMap<&str, &str> = old_units
                    .iter()
                    .zip(old_unit_ids.iter())
                    .map(|(u, id)| (u.name.as_str(), id.as_str()))
                    .collect();
                let new_ids = assign_ids(&result.file_path, &cache_entry.units);
                let new_unit_by_name: HashMap<&str, (&SemanticUnit, &str)> = cache_entry
                    .units
                    .iter()
                    .zip(new_ids.iter())
                    .map(|(u, id)| (u.name.as_str(), (u, id.as_str())))
                    .collect();

                for name in &plan.units_to_delete {
                    if let Some(id) = old_id_by_name.get(name.as_str()) {
                        self.delete_unit(id).map_err(|e| format!("{}: {e}", result.file_path))?;
                    }
                }
                for name in plan.units_to_update.iter().chain(plan.units_to_add.iter()) {
                    if let Some((unit, id)) = new_unit_by_name.get(name.as_str()) {
                        self.upsert_unit(id, unit, &result.file_path)
                            .map_err(|e| format!("{}: {e}", result.file_path))?;
                        self.bm25.lock().expect("lock poisoned").add_document((*id).to_string(), &unit.content);
                    }
                }

                let units_touched = plan.units_to_add.len() + plan.units_to_update.len() + plan.units_to_delete.len();

                let mut state = self.state.lock().expect("lock poisoned");
                state.cache.insert(result.file_hash.clone(), cache_entry.clone());
                state.file_index.insert(
                    result.file_path.clone(),
                    FileRecord {
                        file_path: result.file_path,
                        file_hash: result.file_hash,
                        language: cache_entry.language,
                        last_indexed_at: now_unix(),
                        unit_names: cache_entry.units.iter().map(|u| u.name.clone()).collect(),
                        unit_ids: new_ids,
                    },
                );
                Ok(ApplyOutcome::Applied { units_touched })
            }
        }
    }

    fn upsert_unit(&self, id: &str, unit: &SemanticUnit, file_path: &str) -> Result<(), CodeMemError> {
        let vector = self.embedder.embed(&unit.content)?;
        let mut metadata = HashMap::new();
        metadata.insert(metadata_keys::LANGUAGE.to_string(), unit.language.to_string());
        metadata.insert(metadata_keys::FILE_PATH.to_string(), file_path.to_string());
        metadata.insert(metadata_keys::UNIT_TYPE.to_string(), unit.unit_type.to_string());
        metadata.insert(metadata_keys::UNIT_NAME.to_string(), unit.name.clone());
        self.with_retry(|| self.vector_store.upsert(id, vector.clone(), metadata.clone()))
    }

    fn delete_unit(&self, id: &str) -> Result<(), CodeMemError> {
        self.bm25.lock().expect("lock poisoned").remove_document(id);
        self.with_retry(|| self.vector_store.delete(id))
    }

    fn with_retry(&self, mut op: impl FnMut() -> Result<(), CodeMemError>) -> Result<(), CodeMemError> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(()) => return Ok(()),
                Err(e) if attempt + 1 < self.retry_config.max_attempts => {
                    attempt += 1;
                    let backoff = self.retry_config.base_backoff_ms * (1 << (attempt - 1));
                    warn!(attempt, backoff_ms = backoff, error = %e, "vector store RPC failed, retrying");
                    std::thread::sleep(Duration::from_millis(backoff));
                }
                Err(e) => return Err(CodeMemError::StoreUnavailable(e.to_string())),
            }
        }
    }
}

enum ApplyOutcome {
    CacheHit,
    Applied { units_touched: usize },
}

/// A `SearchCatalog` built from one point-in-time read of the indexer's
/// state. Bridges BM25's bare token tables to the richer metadata the
/// search facade needs for filtering and facets.
pub struct CatalogSnapshot {
    entries: HashMap<String, crate::search::SearchCatalogEntry>,
}

impl crate::search::SearchCatalog for CatalogSnapshot {
    fn lookup(&self, id: &str) -> Option<crate::search::SearchCatalogEntry> {
        self.entries.get(id).cloned()
    }
}
