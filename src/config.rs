//! Tunable defaults for every component, loadable from a TOML file.
//!
//! Every field carries `serde(default)` so a partial config file is valid —
//! callers only override what they care about.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CodeMemError;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Bm25Config {
    pub k1: f64,
    pub b: f64,
    pub delta: f64,
    /// Fraction of corpus-size change since last IDF computation that
    /// triggers a lazy recompute on the next `search`.
    pub idf_refresh_fraction: f64,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            delta: 1.0,
            idf_refresh_fraction: 0.10,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ChangeDetectorConfig {
    /// Minimum LCS-ratio similarity for two files to be considered a rename.
    pub rename_similarity_threshold: f64,
    /// Size-ratio prefilter: reject a rename candidate when
    /// `min(len)/max(len) <= this`.
    pub rename_size_prefilter: f64,
    /// Above this fraction of changed/added/deleted units over total units,
    /// the indexer may do a full reindex instead of many small deltas.
    pub full_reindex_ratio: f64,
}

impl Default for ChangeDetectorConfig {
    fn default() -> Self {
        Self {
            rename_similarity_threshold: 0.8,
            rename_size_prefilter: 0.5,
            full_reindex_ratio: 0.7,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct HybridSearchConfig {
    pub alpha_hybrid: f64,
    pub alpha_semantic: f64,
    pub alpha_keyword: f64,
    /// Floor applied to `top_k` when asking each retrieval modality for
    /// candidates, so fusion has enough material to normalize over.
    pub candidate_floor: usize,
    pub active_project_weight: f64,
    pub other_project_weight: f64,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            alpha_hybrid: 0.6,
            alpha_semantic: 1.0,
            alpha_keyword: 0.0,
            candidate_floor: 50,
            active_project_weight: 2.0,
            other_project_weight: 0.3,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MemoryLifecycleConfig {
    pub session_state_ttl_hours: u64,
    pub safety_gate_hours: u64,
    pub stale_days_unused: u64,
}

impl Default for MemoryLifecycleConfig {
    fn default() -> Self {
        Self {
            session_state_ttl_hours: 48,
            safety_gate_hours: 24,
            stale_days_unused: 30,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    /// Number of most-recent runs averaged for time estimation.
    pub history_window: usize,
    pub estimate_min_factor: f64,
    pub estimate_max_factor: f64,
    pub default_ms_per_file: f64,
    /// Base estimate (seconds) above which the optimization advisor fires.
    pub suggest_threshold_secs: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            history_window: 10,
            estimate_min_factor: 0.8,
            estimate_max_factor: 1.5,
            default_ms_per_file: 100.0,
            suggest_threshold_secs: 30.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 100,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct IndexerConfig {
    /// 0 means "use available_parallelism()".
    pub worker_threads: usize,
    pub per_file_parse_timeout_secs: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            per_file_parse_timeout_secs: 5,
        }
    }
}

/// Top-level engine configuration; loadable from a TOML file with every
/// section optional.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub bm25: Bm25Config,
    pub change_detector: ChangeDetectorConfig,
    pub hybrid_search: HybridSearchConfig,
    pub memory_lifecycle: MemoryLifecycleConfig,
    pub metrics: MetricsConfig,
    pub retry: RetryConfig,
    pub indexer: IndexerConfig,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, CodeMemError> {
        toml::from_str(text).map_err(|e| CodeMemError::InvalidConfig {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, CodeMemError> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| CodeMemError::InvalidConfig {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_tunables() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.bm25.k1, 1.5);
        assert_eq!(cfg.bm25.b, 0.75);
        assert_eq!(cfg.change_detector.rename_similarity_threshold, 0.8);
        assert_eq!(cfg.hybrid_search.alpha_hybrid, 0.6);
        assert_eq!(cfg.memory_lifecycle.session_state_ttl_hours, 48);
        assert_eq!(cfg.memory_lifecycle.safety_gate_hours, 24);
        assert_eq!(cfg.metrics.history_window, 10);
        assert_eq!(cfg.retry.max_attempts, 3);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg = EngineConfig::from_toml_str("[bm25]\nk1 = 2.0\n").unwrap();
        assert_eq!(cfg.bm25.k1, 2.0);
        assert_eq!(cfg.bm25.b, 0.75);
        assert_eq!(cfg.hybrid_search.alpha_hybrid, 0.6);
    }

    #[test]
    fn empty_toml_is_valid() {
        let cfg = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.indexer.per_file_parse_timeout_secs, 5);
    }
}
