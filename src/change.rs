//! Change detection: file-level and unit-level deltas between two tree
//! snapshots, including rename detection by content similarity.
//!
//! Grounded in `original_source/src/memory/change_detector.py`
//! (`ChangeDetector`).

use std::collections::{BTreeSet, HashMap};

use crate::config::ChangeDetectorConfig;
use crate::types::SemanticUnit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Deleted,
    Modified,
    Renamed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileChange {
    pub file_path: String,
    pub change_type: ChangeType,
    pub old_path: Option<String>,
    pub similarity_ratio: f64,
}

#[derive(Debug, Clone, Default)]
pub struct IndexPlan {
    pub file_path: String,
    pub units_to_add: BTreeSet<String>,
    pub units_to_update: BTreeSet<String>,
    pub units_to_delete: BTreeSet<String>,
    pub full_reindex_needed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ChangeDetectorStats {
    pub files_compared: u64,
    pub units_compared: u64,
    pub changes_detected: u64,
}

pub struct ChangeDetector {
    config: ChangeDetectorConfig,
    stats: ChangeDetectorStats,
}

impl ChangeDetector {
    pub fn new(config: ChangeDetectorConfig) -> Self {
        Self {
            config,
            stats: ChangeDetectorStats::default(),
        }
    }

    pub fn stats(&self) -> &ChangeDetectorStats {
        &self.stats
    }

    /// Diff two `path -> content` snapshots into added/deleted/modified
    /// changes, then fold a rename-detection pass over the result.
    pub fn detect_file_changes(
        &mut self,
        old_files: &HashMap<String, String>,
        new_files: &HashMap<String, String>,
    ) -> Vec<FileChange> {
        let mut changes = Vec::new();

        for path in new_files.keys() {
            if !old_files.contains_key(path) {
                changes.push(FileChange {
                    file_path: path.clone(),
                    change_type: ChangeType::Added,
                    old_path: None,
                    similarity_ratio: 0.0,
                });
                self.stats.changes_detected += 1;
            }
        }

        for path in old_files.keys() {
            if !new_files.contains_key(path) {
                changes.push(FileChange {
                    file_path: path.clone(),
                    change_type: ChangeType::Deleted,
                    old_path: None,
                    similarity_ratio: 0.0,
                });
                self.stats.changes_detected += 1;
            }
        }

        for (path, new_content) in new_files {
            if let Some(old_content) = old_files.get(path) {
                self.stats.files_compared += 1;
                if old_content != new_content {
                    changes.push(FileChange {
                        file_path: path.clone(),
                        change_type: ChangeType::Modified,
                        old_path: None,
                        similarity_ratio: 0.0,
                    });
                    self.stats.changes_detected += 1;
                }
            }
        }

        self.detect_renames(changes, old_files, new_files)
    }

    fn detect_renames(
        &self,
        changes: Vec<FileChange>,
        old_files: &HashMap<String, String>,
        new_files: &HashMap<String, String>,
    ) -> Vec<FileChange> {
        let added: Vec<&FileChange> = changes
            .iter()
            .filter(|c| c.change_type == ChangeType::Added)
            .collect();
        let deleted: Vec<&FileChange> = changes
            .iter()
            .filter(|c| c.change_type == ChangeType::Deleted)
            .collect();

        if added.is_empty() || deleted.is_empty() {
            return changes;
        }

        let mut matched_deleted: BTreeSet<String> = BTreeSet::new();
        let mut matched_added: BTreeSet<String> = BTreeSet::new();
        let mut renames: Vec<FileChange> = Vec::new();

        for deleted_change in &deleted {
            let deleted_content = &old_files[&deleted_change.file_path];
            let mut best: Option<(&FileChange, f64)> = None;

            for added_change in &added {
                if matched_added.contains(&added_change.file_path) {
                    continue;
                }
                let added_content = &new_files[&added_change.file_path];

                let size_ratio = content_size_ratio(deleted_content, added_content);
                if size_ratio < self.config.rename_size_prefilter {
                    continue;
                }

                let ratio = content_similarity(deleted_content, added_content);
                if ratio >= self.config.rename_similarity_threshold
                    && ratio > best.map(|(_, r)| r).unwrap_or(0.0)
                {
                    best = Some((added_change, ratio));
                }
            }

            if let Some((added_change, ratio)) = best {
                renames.push(FileChange {
                    file_path: added_change.file_path.clone(),
                    change_type: ChangeType::Renamed,
                    old_path: Some(deleted_change.file_path.clone()),
                    similarity_ratio: ratio,
                });
                matched_deleted.insert(deleted_change.file_path.clone());
                matched_added.insert(added_change.file_path.clone());
            }
        }

        let mut result: Vec<FileChange> = changes
            .into_iter()
            .filter(|c| match c.change_type {
                ChangeType::Deleted => !matched_deleted.contains(&c.file_path),
                ChangeType::Added => !matched_added.contains(&c.file_path),
                _ => true,
            })
            .collect();
        result.extend(renames);
        result
    }

    /// Diff two unit lists by name, using `content_hash` to detect
    /// modification among names common to both.
    pub fn detect_unit_changes(
        &mut self,
        old_units: &[SemanticUnit],
        new_units: &[SemanticUnit],
    ) -> (BTreeSet<String>, BTreeSet<String>, BTreeSet<String>) {
        let old_map: HashMap<&str, &SemanticUnit> =
            old_units.iter().map(|u| (u.name.as_str(), u)).collect();
        let new_map: HashMap<&str, &SemanticUnit> =
            new_units.iter().map(|u| (u.name.as_str(), u)).collect();

        let old_names: BTreeSet<&str> = old_map.keys().copied().collect();
        let new_names: BTreeSet<&str> = new_map.keys().copied().collect();

        let added: BTreeSet<String> = new_names.difference(&old_names).map(|s| s.to_string()).collect();
        let deleted: BTreeSet<String> = old_names.difference(&new_names).map(|s| s.to_string()).collect();

        let mut modified = BTreeSet::new();
        for name in old_names.intersection(&new_names) {
            self.stats.units_compared += 1;
            if old_map[name].content_hash != new_map[name].content_hash {
                modified.insert(name.to_string());
            }
        }

        (added, modified, deleted)
    }

    /// Build the per-file indexing plan for a detected change.
    pub fn get_incremental_index_plan(
        &mut self,
        change: &FileChange,
        old_units: &[SemanticUnit],
        new_units: &[SemanticUnit],
    ) -> IndexPlan {
        let mut plan = IndexPlan {
            file_path: change.file_path.clone(),
            ..Default::default()
        };

        match change.change_type {
            ChangeType::Added => {
                plan.units_to_add = new_units.iter().map(|u| u.name.clone()).collect();
            }
            ChangeType::Deleted => {
                plan.units_to_delete = old_units.iter().map(|u| u.name.clone()).collect();
            }
            ChangeType::Modified | ChangeType::Renamed => {
                let (added, modified, deleted) = self.detect_unit_changes(old_units, new_units);
                let total_changes = added.len() + modified.len() + deleted.len();
                if new_units.len() > 0
                    && (total_changes as f64) > (new_units.len() as f64) * self.config.full_reindex_ratio
                {
                    plan.full_reindex_needed = true;
                }
                plan.units_to_add = added;
                plan.units_to_update = modified;
                plan.units_to_delete = deleted;
            }
        }

        plan
    }
}

/// `min(len) / max(len)` size prefilter, matching the original's quick
/// rename-candidate rejection before the expensive similarity pass.
fn content_size_ratio(a: &str, b: &str) -> f64 {
    let (la, lb) = (a.len(), b.len());
    if la == 0 && lb == 0 {
        return 1.0;
    }
    la.min(lb) as f64 / la.max(lb).max(1) as f64
}

/// `difflib.SequenceMatcher.ratio()`-equivalent: `2 * matches / (len_a +
/// len_b)`, where `matches` is the total length of a recursive longest
/// common matching-block decomposition over character sequences.
pub fn content_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let matches = matching_blocks_total(&a, &b);
    (2.0 * matches as f64) / (a.len() + b.len()) as f64
}

/// Recursive longest-matching-block sum, the same decomposition
/// `SequenceMatcher.ratio()` performs: find the single longest common
/// substring, then recurse on the slices to its left and right.
fn matching_blocks_total(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (len, ai, bi) = longest_common_substring(a, b);
    if len == 0 {
        return 0;
    }
    let left = matching_blocks_total(&a[..ai], &b[..bi]);
    let right = matching_blocks_total(&a[ai + len..], &b[bi + len..]);
    len + left + right
}

fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut prev = vec![0usize; b.len() + 1];
    let mut best = (0usize, 0usize, 0usize);
    for i in 0..a.len() {
        let mut curr = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                curr[j + 1] = prev[j] + 1;
                if curr[j + 1] > best.0 {
                    best = (curr[j + 1], i + 1 - curr[j + 1], j + 1 - curr[j + 1]);
                }
            }
        }
        prev = curr;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Language, UnitType};

    fn unit(name: &str, content: &str) -> SemanticUnit {
        SemanticUnit::new(UnitType::Function, name, Language::Python, "a.py", 1, 1, 0, content.len() as u32, content)
    }

    #[test]
    fn identical_content_has_similarity_one() {
        assert_eq!(content_similarity("hello world", "hello world"), 1.0);
    }

    #[test]
    fn completely_different_content_has_low_similarity() {
        assert!(content_similarity("aaaa", "bbbb") < 0.5);
    }

    #[test]
    fn added_and_deleted_files_detected() {
        let mut detector = ChangeDetector::new(ChangeDetectorConfig::default());
        let old = HashMap::from([("old.py".to_string(), "content".to_string())]);
        let new = HashMap::from([("new_other.py".to_string(), "totally different stuff".to_string())]);
        let changes = detector.detect_file_changes(&old, &new);
        assert!(changes.iter().any(|c| c.change_type == ChangeType::Deleted));
        assert!(changes.iter().any(|c| c.change_type == ChangeType::Added));
    }

    #[test]
    fn rename_detected_for_identical_content_under_new_path() {
        let mut detector = ChangeDetector::new(ChangeDetectorConfig::default());
        let content = "def handler():\n    return 42\n".repeat(5);
        let old = HashMap::from([("old.py".to_string(), content.clone())]);
        let new = HashMap::from([("new.py".to_string(), content)]);
        let changes = detector.detect_file_changes(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Renamed);
        assert_eq!(changes[0].old_path.as_deref(), Some("old.py"));
        assert_eq!(changes[0].file_path, "new.py");
        assert!((changes[0].similarity_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unit_changes_detected_by_content_hash() {
        let mut detector = ChangeDetector::new(ChangeDetectorConfig::default());
        let old_units = vec![unit("foo", "def foo(): return 1"), unit("bar", "def bar(): return 2")];
        let new_units = vec![unit("foo", "def foo(): return 999"), unit("baz", "def baz(): return 3")];
        let (added, modified, deleted) = detector.detect_unit_changes(&old_units, &new_units);
        assert_eq!(added, BTreeSet::from(["baz".to_string()]));
        assert_eq!(modified, BTreeSet::from(["foo".to_string()]));
        assert_eq!(deleted, BTreeSet::from(["bar".to_string()]));
    }

    #[test]
    fn incremental_edit_scenario_from_spec() {
        let mut detector = ChangeDetector::new(ChangeDetectorConfig::default());
        let old_units = vec![unit("foo", "def foo(): return 1")];
        let new_units = vec![unit("foo", "def foo(): return 2")];
        let change = FileChange {
            file_path: "a.py".to_string(),
            change_type: ChangeType::Modified,
            old_path: None,
            similarity_ratio: 0.0,
        };
        let plan = detector.get_incremental_index_plan(&change, &old_units, &new_units);
        assert!(plan.units_to_add.is_empty());
        assert_eq!(plan.units_to_update, BTreeSet::from(["foo".to_string()]));
        assert!(plan.units_to_delete.is_empty());
        assert!(!plan.full_reindex_needed);
    }

    #[test]
    fn high_churn_triggers_full_reindex() {
        let mut detector = ChangeDetector::new(ChangeDetectorConfig::default());
        let old_units = vec![unit("a", "1"), unit("b", "2"), unit("c", "3")];
        let new_units = vec![unit("d", "4"), unit("e", "5"), unit("c", "3")];
        let change = FileChange {
            file_path: "a.py".to_string(),
            change_type: ChangeType::Modified,
            old_path: None,
            similarity_ratio: 0.0,
        };
        let plan = detector.get_incremental_index_plan(&change, &old_units, &new_units);
        assert!(plan.full_reindex_needed);
    }

    use proptest::prelude::*;

    proptest! {
        /// `content_similarity` is symmetric regardless of argument order.
        #[test]
        fn content_similarity_is_symmetric(a in "\\PC{0,80}", b in "\\PC{0,80}") {
            let forward = content_similarity(&a, &b);
            let backward = content_similarity(&b, &a);
            prop_assert!((forward - backward).abs() < 1e-9);
        }
    }

    proptest! {
        /// A snapshot compared against an identical copy of itself never
        /// reports a file-level change.
        #[test]
        fn identical_snapshots_yield_no_changes(
            paths in proptest::collection::vec("[a-z]{1,8}\\.py", 1..10),
            contents in proptest::collection::vec("[a-z ]{0,40}", 1..10),
        ) {
            let len = paths.len().min(contents.len());
            let snapshot: HashMap<String, String> = paths.into_iter().take(len)
                .zip(contents.into_iter().take(len))
                .collect();
            let mut detector = ChangeDetector::new(ChangeDetectorConfig::default());
            let changes = detector.detect_file_changes(&snapshot, &snapshot);
            prop_assert!(changes.is_empty());
        }
    }
}
