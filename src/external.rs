//! External collaborator interfaces: the embedding model and the vector
//! store backend. Both are out of scope as products — this crate only
//! specifies the trait boundary and ships an in-memory reference
//! `VectorStore` for tests and small corpora.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::CodeMemError;

/// A pure function of text to a fixed-dimension embedding. Same input
/// always yields the same output, so callers may cache at the call site.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>, CodeMemError>;
}

/// One hit from a vector-store query.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub metadata: HashMap<String, String>,
}

/// Metadata keys the core attaches to every upsert; consumers may ignore
/// keys they don't index on.
pub mod metadata_keys {
    pub const LANGUAGE: &str = "language";
    pub const FILE_PATH: &str = "file_path";
    pub const PROJECT_NAME: &str = "project_name";
    pub const UNIT_TYPE: &str = "unit_type";
    pub const UNIT_NAME: &str = "unit_name";
    pub const CONTEXT_LEVEL: &str = "context_level";
    pub const CATEGORY: &str = "category";
    pub const SCOPE: &str = "scope";
    pub const CREATED_AT: &str = "created_at";
    pub const LAST_USED: &str = "last_used";
    pub const USE_COUNT: &str = "use_count";
}

/// External nearest-neighbor service. `upsert` and `delete` are idempotent
/// by id, which is what lets the indexer retry under at-least-once
/// semantics.
pub trait VectorStore: Send + Sync {
    fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        metadata: HashMap<String, String>,
    ) -> Result<(), CodeMemError>;

    fn delete(&self, id: &str) -> Result<(), CodeMemError>;

    fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&HashMap<String, String>>,
    ) -> Result<Vec<VectorMatch>, CodeMemError>;

    /// Criteria query used by the pruner; the default falls back to
    /// `list_all` + in-process filtering for stores that don't support a
    /// native criteria query.
    fn find_by_criteria(
        &self,
        filter: &HashMap<String, String>,
    ) -> Result<Vec<VectorMatch>, CodeMemError> {
        let all = self.list_all()?;
        Ok(all
            .into_iter()
            .filter(|m| filter.iter().all(|(k, v)| m.metadata.get(k) == Some(v)))
            .collect())
    }

    fn list_all(&self) -> Result<Vec<VectorMatch>, CodeMemError>;
}

struct StoredVector {
    vector: Vec<f32>,
    metadata: HashMap<String, String>,
}

/// Brute-force cosine-similarity scan, kept entirely in process memory.
/// Adequate for tests and small corpora; not a production backend.
#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<HashMap<String, StoredVector>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

impl VectorStore for InMemoryVectorStore {
    fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        metadata: HashMap<String, String>,
    ) -> Result<(), CodeMemError> {
        let mut entries = self.entries.write().expect("lock poisoned");
        entries.insert(id.to_string(), StoredVector { vector, metadata });
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), CodeMemError> {
        let mut entries = self.entries.write().expect("lock poisoned");
        entries.remove(id);
        Ok(())
    }

    fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&HashMap<String, String>>,
    ) -> Result<Vec<VectorMatch>, CodeMemError> {
        let entries = self.entries.read().expect("lock poisoned");
        let mut scored: Vec<VectorMatch> = entries
            .iter()
            .filter(|(_, v)| match filter {
                Some(f) => f.iter().all(|(k, val)| v.metadata.get(k) == Some(val)),
                None => true,
            })
            .map(|(id, v)| VectorMatch {
                id: id.clone(),
                score: cosine_similarity(vector, &v.vector),
                metadata: v.metadata.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn list_all(&self) -> Result<Vec<VectorMatch>, CodeMemError> {
        let entries = self.entries.read().expect("lock poisoned");
        Ok(entries
            .iter()
            .map(|(id, v)| VectorMatch {
                id: id.clone(),
                score: 0.0,
                metadata: v.metadata.clone(),
            })
            .collect())
    }
}

/// Deterministic stand-in embedder for tests: hashes tokens into a fixed-
/// dimension bag-of-words vector. Not meant to produce meaningful
/// similarity beyond exact/overlapping-token cases.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, CodeMemError> {
        let mut v = vec![0.0f32; self.dimension];
        for token in text.split_whitespace() {
            let h = token.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            let idx = (h as usize) % self.dimension;
            v[idx] += 1.0;
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_query_finds_self() {
        let store = InMemoryVectorStore::new();
        store.upsert("a", vec![1.0, 0.0], HashMap::new()).unwrap();
        store.upsert("b", vec![0.0, 1.0], HashMap::new()).unwrap();
        let results = store.query(&[1.0, 0.0], 1, None).unwrap();
        assert_eq!(results[0].id, "a");
    }

    #[test]
    fn delete_is_idempotent() {
        let store = InMemoryVectorStore::new();
        store.upsert("a", vec![1.0], HashMap::new()).unwrap();
        store.delete("a").unwrap();
        store.delete("a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn filter_pushdown_restricts_results() {
        let store = InMemoryVectorStore::new();
        let mut meta_a = HashMap::new();
        meta_a.insert("language".to_string(), "python".to_string());
        store.upsert("a", vec![1.0, 0.0], meta_a).unwrap();
        let mut meta_b = HashMap::new();
        meta_b.insert("language".to_string(), "rust".to_string());
        store.upsert("b", vec![1.0, 0.0], meta_b).unwrap();

        let mut filter = HashMap::new();
        filter.insert("language".to_string(), "rust".to_string());
        let results = store.query(&[1.0, 0.0], 10, Some(&filter)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }

    #[test]
    fn hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder::new(32);
        assert_eq!(embedder.embed("hello world").unwrap(), embedder.embed("hello world").unwrap());
    }
}
