//! Memory lifecycle: the stored-memory data model and the pruner that
//! enforces TTL/retention policy per context level.
//!
//! Grounded in `original_source/src/memory/pruner.py` (`MemoryPruner`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::config::MemoryLifecycleConfig;
use crate::error::CodeMemError;
use crate::external::{metadata_keys, VectorStore};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryCategory {
    Preference,
    Fact,
    Event,
    Workflow,
    Context,
    Code,
    Documentation,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryScope {
    Global,
    Project,
}

/// Lifecycle class of a stored memory. `Other` covers everything not
/// explicitly called out by spec — stale-prunable after `days_unused` when
/// unused.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextLevel {
    UserPreference,
    ProjectContext,
    SessionState,
    Other,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub category: MemoryCategory,
    pub scope: MemoryScope,
    pub project_name: Option<String>,
    pub context_level: ContextLevel,
    pub importance: f64,
    /// Unix seconds.
    pub created_at: u64,
    pub last_used: Option<u64>,
    pub use_count: u64,
    pub embedding_ref: Option<String>,
}

impl Memory {
    /// `max(last_used, created_at)`, the reference instant TTL and
    /// staleness are measured against.
    pub fn reference_time(&self) -> u64 {
        self.last_used.unwrap_or(0).max(self.created_at)
    }
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Debug, Clone, Default)]
pub struct PruneResult {
    pub memories_scanned: usize,
    pub memories_deleted: usize,
    pub deleted_ids: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PrunerStats {
    pub total_prunes: u64,
    pub total_deleted: u64,
    pub last_prune_time: Option<u64>,
    pub last_prune_deleted: usize,
}

/// A queryable memory backend: a criteria-query fast path plus a full-scan
/// fallback the pruner uses when the backend can't filter natively.
pub trait MemoryStore: Send + Sync {
    fn find_by_context_level(&self, level: ContextLevel) -> Vec<Memory>;
    fn all(&self) -> Vec<Memory>;
    fn delete(&self, id: &str) -> bool;
    /// Ids with usage-tracking rows that no longer have a backing memory.
    fn orphaned_usage_tracking_ids(&self) -> Vec<String>;
    fn delete_usage_tracking(&self, id: &str) -> bool;
}

pub struct Pruner<'a> {
    config: MemoryLifecycleConfig,
    store: &'a dyn MemoryStore,
    vector_store: Option<&'a dyn VectorStore>,
    stats: PrunerStats,
}

impl<'a> Pruner<'a> {
    pub fn new(config: MemoryLifecycleConfig, store: &'a dyn MemoryStore) -> Self {
        Self {
            config,
            store,
            vector_store: None,
            stats: PrunerStats::default(),
        }
    }

    pub fn with_vector_store(mut self, vector_store: &'a dyn VectorStore) -> Self {
        self.vector_store = Some(vector_store);
        self
    }

    pub fn stats(&self) -> &PrunerStats {
        &self.stats
    }

    fn find_expired_sessions(&self, ttl_hours: u64) -> Vec<Memory> {
        let cutoff = now_unix().saturating_sub(ttl_hours * 3600);
        self.store
            .find_by_context_level(ContextLevel::SessionState)
            .into_iter()
            .filter(|m| m.reference_time() < cutoff)
            .collect()
    }

    fn find_stale_memories(&self, days_unused: u64) -> Vec<Memory> {
        let cutoff = now_unix().saturating_sub(days_unused * 86400);
        self.store
            .all()
            .into_iter()
            .filter(|m| {
                !matches!(
                    m.context_level,
                    ContextLevel::UserPreference | ContextLevel::ProjectContext
                )
            })
            .filter(|m| m.use_count == 0 && m.reference_time() < cutoff)
            .collect()
    }

    /// Expire `SESSION_STATE` memories older than `ttl_hours`
    /// (config default if `None`), applying the 24h safety gate unless
    /// `safety_check` is false.
    pub fn prune_expired(
        &mut self,
        dry_run: bool,
        ttl_hours: Option<u64>,
        safety_check: bool,
    ) -> PruneResult {
        let ttl_hours = ttl_hours.unwrap_or(self.config.session_state_ttl_hours);
        let mut expired = self.find_expired_sessions(ttl_hours);
        let mut result = PruneResult {
            memories_scanned: expired.len(),
            ..Default::default()
        };
        info!(count = expired.len(), "found expired SESSION_STATE memories");

        if safety_check {
            let safety_cutoff = now_unix().saturating_sub(self.config.safety_gate_hours * 3600);
            expired.retain(|m| {
                let safe = m.reference_time() < safety_cutoff;
                if !safe {
                    debug!(id = %m.id, "skipping, used within safety gate window");
                }
                safe
            });
        }

        self.delete_batch(&expired, dry_run, &mut result);
        self.record_run(&result);
        result
    }

    /// Delete memories unused for `days_unused` (config default if `None`),
    /// excluding `USER_PREFERENCE`/`PROJECT_CONTEXT` which are never
    /// stale-pruned.
    pub fn prune_stale(&mut self, days_unused: Option<u64>, dry_run: bool) -> PruneResult {
        let days_unused = days_unused.unwrap_or(self.config.stale_days_unused);
        let stale = self.find_stale_memories(days_unused);
        let mut result = PruneResult {
            memories_scanned: stale.len(),
            ..Default::default()
        };
        info!(count = stale.len(), days_unused, "found stale memories");

        self.delete_batch(&stale, dry_run, &mut result);
        self.record_run(&result);
        result
    }

    fn delete_batch(&self, candidates: &[Memory], dry_run: bool, result: &mut PruneResult) {
        if dry_run {
            result.memories_deleted = candidates.len();
            result.deleted_ids = candidates.iter().map(|m| m.id.clone()).collect();
            return;
        }
        for memory in candidates {
            if self.store.delete(&memory.id) {
                result.memories_deleted += 1;
                result.deleted_ids.push(memory.id.clone());
                self.store.delete_usage_tracking(&memory.id);
                if let Some(vs) = self.vector_store {
                    if let Err(e) = vs.delete(&memory.id) {
                        warn!(id = %memory.id, error = %e, "failed to delete from vector store");
                        result.errors.push(format!("vector store delete {}: {e}", memory.id));
                    }
                }
            } else {
                result.errors.push(format!("failed to delete {}", memory.id));
            }
        }
    }

    fn record_run(&mut self, result: &PruneResult) {
        self.stats.total_prunes += 1;
        self.stats.total_deleted += result.memories_deleted as u64;
        self.stats.last_prune_time = Some(now_unix());
        self.stats.last_prune_deleted = result.memories_deleted;
    }

    /// Remove usage-tracking rows whose memory id no longer exists.
    pub fn cleanup_orphans(&self) -> usize {
        let orphans = self.store.orphaned_usage_tracking_ids();
        let mut count = 0;
        for id in &orphans {
            if self.store.delete_usage_tracking(id) {
                count += 1;
            }
        }
        info!(count, "cleaned up orphaned usage-tracking records");
        count
    }
}

/// A JSON-file-backed `MemoryStore` for CLI use: loads the whole file into
/// memory on open and rewrites it on every delete. Adequate for a single
/// local agent's memory file; not a concurrent-writer backend.
pub struct JsonFileMemoryStore {
    path: PathBuf,
    memories: Mutex<Vec<Memory>>,
}

impl JsonFileMemoryStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CodeMemError> {
        let path = path.into();
        let memories = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str(&text).map_err(|e| CodeMemError::InvalidConfig {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            Vec::new()
        };
        Ok(Self {
            path,
            memories: Mutex::new(memories),
        })
    }

    pub fn len(&self) -> usize {
        self.memories.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, memories: &[Memory]) -> Result<(), CodeMemError> {
        let text = serde_json::to_string_pretty(memories).map_err(|e| CodeMemError::InvalidConfig {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl MemoryStore for JsonFileMemoryStore {
    fn find_by_context_level(&self, level: ContextLevel) -> Vec<Memory> {
        self.memories
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|m| m.context_level == level)
            .cloned()
            .collect()
    }

    fn all(&self) -> Vec<Memory> {
        self.memories.lock().expect("lock poisoned").clone()
    }

    fn delete(&self, id: &str) -> bool {
        let mut memories = self.memories.lock().expect("lock poisoned");
        let before = memories.len();
        memories.retain(|m| m.id != id);
        let changed = memories.len() != before;
        if changed {
            let snapshot = memories.clone();
            drop(memories);
            if let Err(e) = self.persist(&snapshot) {
                warn!(error = %e, "failed to persist memory store after delete");
            }
        }
        changed
    }

    /// This backend doesn't keep a separate usage-tracking table, so
    /// there's nothing to ever leave orphaned.
    fn orphaned_usage_tracking_ids(&self) -> Vec<String> {
        Vec::new()
    }

    fn delete_usage_tracking(&self, _id: &str) -> bool {
        true
    }
}

pub fn memory_metadata(memory: &Memory) -> HashMap<String, String> {
    let mut meta = HashMap::new();
    meta.insert(
        metadata_keys::CONTEXT_LEVEL.to_string(),
        format!("{:?}", memory.context_level),
    );
    meta.insert(
        metadata_keys::CATEGORY.to_string(),
        format!("{:?}", memory.category),
    );
    meta.insert(metadata_keys::SCOPE.to_string(), format!("{:?}", memory.scope));
    meta.insert(metadata_keys::CREATED_AT.to_string(), memory.created_at.to_string());
    if let Some(last_used) = memory.last_used {
        meta.insert(metadata_keys::LAST_USED.to_string(), last_used.to_string());
    }
    meta.insert(metadata_keys::USE_COUNT.to_string(), memory.use_count.to_string());
    if let Some(project) = &memory.project_name {
        meta.insert(metadata_keys::PROJECT_NAME.to_string(), project.clone());
    }
    meta
}
