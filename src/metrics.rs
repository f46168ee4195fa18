//! Indexing performance metrics and time estimation (component I).
//!
//! Grounded in `original_source/src/memory/indexing_metrics.py`
//! (`IndexingMetricsStore`) and `original_source/src/memory/
//! time_estimator.py` (`TimeEstimator`). Re-grounded on an in-process
//! ring buffer with an optional JSON-lines append log rather than SQLite,
//! since the teacher's stack carries no SQL-embedded-database crate.

use std::collections::VecDeque;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::config::MetricsConfig;
use crate::error::CodeMemError;

const RING_CAPACITY: usize = 200;
const SIZE_BASELINE_BYTES: f64 = 100_000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingMetric {
    pub project_name: Option<String>,
    pub files_indexed: usize,
    pub total_time_seconds: f64,
    pub avg_time_per_file_ms: f64,
    pub total_size_bytes: Option<u64>,
    pub timestamp_unix: u64,
}

/// Bounded in-memory history of recent indexing runs, optionally mirrored
/// to an append-only JSON-lines file for cross-process durability.
pub struct MetricsStore {
    recent: Mutex<VecDeque<IndexingMetric>>,
    log_path: Option<PathBuf>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self { recent: Mutex::new(VecDeque::with_capacity(RING_CAPACITY)), log_path: None }
    }

    pub fn with_log_file(log_path: impl Into<PathBuf>) -> Self {
        Self { recent: Mutex::new(VecDeque::with_capacity(RING_CAPACITY)), log_path: Some(log_path.into()) }
    }

    pub fn store_metrics(
        &self,
        files_indexed: usize,
        total_time_seconds: f64,
        project_name: Option<String>,
        total_size_bytes: Option<u64>,
        now_unix: u64,
    ) -> Result<(), CodeMemError> {
        let avg_time_per_file_ms = if files_indexed > 0 {
            (total_time_seconds / files_indexed as f64) * 1000.0
        } else {
            0.0
        };
        let metric = IndexingMetric {
            project_name,
            files_indexed,
            total_time_seconds,
            avg_time_per_file_ms,
            total_size_bytes,
            timestamp_unix: now_unix,
        };

        if let Some(path) = &self.log_path {
            append_jsonl(path, &metric)?;
        }

        let mut recent = self.recent.lock().map_err(|_| CodeMemError::LockPoisoned("metrics".into()))?;
        if recent.len() == RING_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(metric);
        Ok(())
    }

    /// Average time per file, in seconds, over the last `limit` runs
    /// (optionally filtered by project). `None` when there's no history.
    pub fn average_time_per_file(
        &self,
        project_name: Option<&str>,
        limit: usize,
    ) -> Result<Option<f64>, CodeMemError> {
        let recent = self.recent.lock().map_err(|_| CodeMemError::LockPoisoned("metrics".into()))?;
        let matching: Vec<f64> = recent
            .iter()
            .rev()
            .filter(|m| project_name.is_none() || m.project_name.as_deref() == project_name)
            .take(limit)
            .map(|m| m.avg_time_per_file_ms)
            .collect();

        if matching.is_empty() {
            return Ok(None);
        }
        let avg_ms: f64 = matching.iter().sum::<f64>() / matching.len() as f64;
        Ok(Some(avg_ms / 1000.0))
    }

    pub fn recent_metrics(&self, limit: usize) -> Result<Vec<IndexingMetric>, CodeMemError> {
        let recent = self.recent.lock().map_err(|_| CodeMemError::LockPoisoned("metrics".into()))?;
        Ok(recent.iter().rev().take(limit).cloned().collect())
    }

    /// Drops in-memory entries older than `cutoff_unix`. Returns the count
    /// removed. The JSON-lines log, if any, is left untouched — it is an
    /// append-only audit trail, not a pruned cache.
    pub fn clear_old_metrics(&self, cutoff_unix: u64) -> Result<usize, CodeMemError> {
        let mut recent = self.recent.lock().map_err(|_| CodeMemError::LockPoisoned("metrics".into()))?;
        let before = recent.len();
        recent.retain(|m| m.timestamp_unix >= cutoff_unix);
        Ok(before - recent.len())
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

fn append_jsonl(path: &Path, metric: &IndexingMetric) -> Result<(), CodeMemError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(metric)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Estimate indexing time based on historical per-file cost, falling back
/// to a conservative default when there's no history yet. Every tunable
/// comes from `MetricsConfig` — a config file's `[metrics]` section
/// directly controls these estimates.
pub struct TimeEstimator<'a> {
    metrics: &'a MetricsStore,
    config: MetricsConfig,
}

impl<'a> TimeEstimator<'a> {
    pub fn new(metrics: &'a MetricsStore, config: MetricsConfig) -> Self {
        Self { metrics, config }
    }

    /// Returns `(min_seconds, max_seconds)` bounded by
    /// `estimate_min_factor`/`estimate_max_factor`.
    pub fn estimate_indexing_time(
        &self,
        file_count: usize,
        project_name: Option<&str>,
        total_size_bytes: Option<u64>,
    ) -> Result<(f64, f64), CodeMemError> {
        let default_secs_per_file = self.config.default_ms_per_file / 1000.0;
        let mut avg_time = self
            .metrics
            .average_time_per_file(project_name, self.config.history_window)?
            .unwrap_or(default_secs_per_file);

        if let Some(total_size) = total_size_bytes {
            if file_count > 0 {
                let avg_size = total_size as f64 / file_count as f64;
                let size_factor = 1.0 + (avg_size / SIZE_BASELINE_BYTES);
                avg_time *= size_factor;
            }
        }

        let base_estimate = file_count as f64 * avg_time;
        Ok((base_estimate * self.config.estimate_min_factor, base_estimate * self.config.estimate_max_factor))
    }

    pub fn calculate_eta(files_completed: usize, files_total: usize, elapsed_seconds: f64) -> f64 {
        if files_completed == 0 {
            return 0.0;
        }
        let rate = elapsed_seconds / files_completed as f64;
        let remaining_files = files_total.saturating_sub(files_completed);
        remaining_files as f64 * rate
    }

    /// Heuristic suggestions for trimming the index scope, offered only
    /// once the estimate crosses `config.suggest_threshold_secs`.
    pub fn suggest_optimizations(&self, file_paths: &[String], estimated_seconds: f64) -> Vec<String> {
        let mut suggestions = Vec::new();
        if estimated_seconds < self.config.suggest_threshold_secs {
            return suggestions;
        }
        let per_file_secs = self.config.default_ms_per_file / 1000.0;

        let node_modules: Vec<&String> = file_paths.iter().filter(|p| p.contains("node_modules")).collect();
        let test_files: Vec<&String> = file_paths
            .iter()
            .filter(|p| ["test", "tests", "spec", "__tests__"].iter().any(|t| p.contains(t)))
            .collect();
        let git_files: Vec<&String> = file_paths.iter().filter(|p| p.contains(".git")).collect();
        let vendor_files: Vec<&String> = file_paths
            .iter()
            .filter(|p| ["vendor", "third_party", "external"].iter().any(|v| p.contains(v)))
            .collect();

        if !node_modules.is_empty() {
            let saved = node_modules.len() as f64 * per_file_secs;
            suggestions.push(format!(
                "Exclude node_modules/ ({} files, saves ~{:.0}s)",
                node_modules.len(),
                saved
            ));
        }
        if test_files.len() > 50 {
            let saved = test_files.len() as f64 * per_file_secs;
            suggestions.push(format!(
                "Exclude test directories ({} files, saves ~{:.0}s)",
                test_files.len(),
                saved
            ));
        }
        if !git_files.is_empty() {
            suggestions.push(format!("Exclude .git/ directory ({} files)", git_files.len()));
        }
        if !vendor_files.is_empty() {
            let saved = vendor_files.len() as f64 * per_file_secs;
            suggestions.push(format!(
                "Exclude vendor/third_party directories ({} files, saves ~{:.0}s)",
                vendor_files.len(),
                saved
            ));
        }
        if suggestions.len() >= 2 {
            suggestions.push("Create a .codememignore file to permanently exclude these patterns".to_string());
        }
        suggestions
    }
}

pub fn format_time(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.0}s")
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0) as u64;
        let remaining = (seconds % 60.0) as u64;
        if remaining > 0 {
            format!("{minutes}m {remaining}s")
        } else {
            format!("{minutes}m")
        }
    } else {
        let hours = (seconds / 3600.0) as u64;
        let remaining_minutes = ((seconds % 3600.0) / 60.0) as u64;
        if remaining_minutes > 0 {
            format!("{hours}h {remaining_minutes}m")
        } else {
            format!("{hours}h")
        }
    }
}

pub fn format_estimate_range(min_seconds: f64, max_seconds: f64) -> String {
    let min_str = format_time(min_seconds);
    let max_str = format_time(max_seconds);
    let same_unit = (min_str.ends_with('s') && max_str.ends_with('s'))
        || (min_str.ends_with('m') && max_str.ends_with('m') && !min_str.contains(' '))
        || (min_str.ends_with('h') && max_str.ends_with('h') && !min_str.contains(' '));
    if same_unit {
        format!("{min_str}-{max_str}")
    } else {
        format!("{min_str} to {max_str}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn store_then_average_roundtrips() {
        let store = MetricsStore::new();
        store.store_metrics(10, 2.0, Some("proj".to_string()), None, 1000).unwrap();
        store.store_metrics(20, 6.0, Some("proj".to_string()), None, 1001).unwrap();
        let avg = store.average_time_per_file(Some("proj"), 10).unwrap().unwrap();
        // run 1: 200ms/file, run 2: 300ms/file -> avg 250ms = 0.25s
        assert!((avg - 0.25).abs() < 1e-9);
    }

    #[test]
    fn no_history_returns_none() {
        let store = MetricsStore::new();
        assert!(store.average_time_per_file(None, 10).unwrap().is_none());
    }

    #[test]
    fn estimate_uses_default_when_no_history() {
        let store = MetricsStore::new();
        let config = MetricsConfig::default();
        let estimator = TimeEstimator::new(&store, config.clone());
        let (min, max) = estimator.estimate_indexing_time(100, None, None).unwrap();
        let base = 100.0 * (config.default_ms_per_file / 1000.0);
        assert!((min - base * config.estimate_min_factor).abs() < 1e-9);
        assert!((max - base * config.estimate_max_factor).abs() < 1e-9);
    }

    #[test]
    fn estimate_respects_custom_history_window_and_factors() {
        let store = MetricsStore::new();
        store.store_metrics(10, 1.0, None, None, 1).unwrap();
        let config = MetricsConfig {
            history_window: 1,
            estimate_min_factor: 0.5,
            estimate_max_factor: 2.0,
            default_ms_per_file: 999.0,
            suggest_threshold_secs: 30.0,
        };
        let estimator = TimeEstimator::new(&store, config.clone());
        // One run of 10 files in 1.0s -> 100ms/file -> 0.1s/file, not the
        // (unused, since history exists) default_ms_per_file.
        let (min, max) = estimator.estimate_indexing_time(10, None, None).unwrap();
        let base = 10.0 * 0.1;
        assert!((min - base * config.estimate_min_factor).abs() < 1e-9);
        assert!((max - base * config.estimate_max_factor).abs() < 1e-9);
    }

    #[test]
    fn ring_buffer_evicts_oldest_beyond_capacity() {
        let store = MetricsStore::new();
        for i in 0..(RING_CAPACITY + 10) {
            store.store_metrics(1, 0.1, None, None, i as u64).unwrap();
        }
        let all = store.recent_metrics(RING_CAPACITY + 50).unwrap();
        assert_eq!(all.len(), RING_CAPACITY);
        assert_eq!(all.last().unwrap().timestamp_unix, 10);
    }

    #[test]
    fn jsonl_log_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");
        let store = MetricsStore::with_log_file(&path);
        store.store_metrics(5, 1.0, None, None, 42).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"files_indexed\":5"));
    }

    #[test]
    fn format_time_buckets() {
        assert_eq!(format_time(45.0), "45s");
        assert_eq!(format_time(150.0), "2m 30s");
        assert_eq!(format_time(7200.0), "2h");
    }

    #[test]
    fn format_estimate_range_same_unit() {
        assert_eq!(format_estimate_range(20.0, 40.0), "20s-40s");
    }

    #[test]
    fn eta_zero_when_nothing_completed() {
        assert_eq!(TimeEstimator::calculate_eta(0, 100, 5.0), 0.0);
    }

    #[test]
    fn suggestions_empty_below_threshold() {
        let store = MetricsStore::new();
        let estimator = TimeEstimator::new(&store, MetricsConfig::default());
        let files = vec!["node_modules/a.js".to_string()];
        assert!(estimator.suggest_optimizations(&files, 5.0).is_empty());
    }

    #[test]
    fn suggestions_flag_node_modules_above_threshold() {
        let store = MetricsStore::new();
        let estimator = TimeEstimator::new(&store, MetricsConfig::default());
        let files: Vec<String> = (0..5).map(|i| format!("node_modules/f{i}.js")).collect();
        let suggestions = estimator.suggest_optimizations(&files, 60.0);
        assert!(suggestions.iter().any(|s| s.contains("node_modules")));
    }

    #[test]
    fn suggestions_respect_custom_threshold() {
        let store = MetricsStore::new();
        let config = MetricsConfig { suggest_threshold_secs: 5.0, ..MetricsConfig::default() };
        let estimator = TimeEstimator::new(&store, config);
        let files: Vec<String> = (0..5).map(|i| format!("node_modules/f{i}.js")).collect();
        // Below the teacher-default 30s threshold but above this config's 5s.
        assert!(!estimator.suggest_optimizations(&files, 10.0).is_empty());
    }
}
