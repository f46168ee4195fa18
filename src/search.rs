//! Hybrid search engine (component G): fuses semantic (vector store) and
//! keyword (BM25) retrieval, applies filters and project weighting, and
//! attaches facets + refinement hints.
//!
//! Grounded in `original_source/src/search/` (query_dsl_parser.py +
//! the hybrid fusion performed by the memory server around it) and the
//! teacher's `index.rs` scoring conventions (min-max normalization,
//! descending sort, truncate-to-top-k).

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::bm25::Bm25Index;
use crate::error::CodeMemError;
use crate::external::{Embedder, VectorStore};
use crate::facets::{build_facets, refinement_hints, summarize, SearchFacets};
use crate::query::{self, FilterValue, ParsedQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Semantic,
    Keyword,
    Hybrid,
}

impl SearchMode {
    fn alpha(self, config: &crate::config::HybridSearchConfig) -> f64 {
        match self {
            SearchMode::Semantic => config.alpha_semantic,
            SearchMode::Keyword => config.alpha_keyword,
            SearchMode::Hybrid => config.alpha_hybrid,
        }
    }

    fn wants_semantic(self) -> bool {
        !matches!(self, SearchMode::Keyword)
    }

    fn wants_keyword(self) -> bool {
        !matches!(self, SearchMode::Semantic)
    }

    fn is_keyword(self) -> bool {
        matches!(self, SearchMode::Keyword)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub id: String,
    pub score: f64,
    pub language: String,
    pub unit_type: String,
    pub name: String,
    pub file_path: String,
    pub project_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub top_k: usize,
    pub mode: SearchMode,
    pub project: Option<String>,
    /// Active-project boost: active gets `active_boost`, all others get
    /// `other_boost`, applied multiplicatively after fusion.
    pub project_weighting: Option<ProjectWeighting>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { top_k: 10, mode: SearchMode::Hybrid, project: None, project_weighting: None }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectWeighting {
    pub active_project: String,
    pub active_boost: f64,
    pub other_boost: f64,
}

impl Default for ProjectWeighting {
    fn default() -> Self {
        Self { active_project: String::new(), active_boost: 2.0, other_boost: 0.3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub facets: SearchFacets,
    pub summary: String,
    pub hints: Vec<String>,
}

/// Catalog entry backing keyword-only metadata lookups: every item the
/// BM25 index knows about needs its language/unit_type/file_path/project
/// available for post-filtering and facet building even when the vector
/// store wasn't consulted (keyword-only mode).
#[derive(Debug, Clone)]
pub struct SearchCatalogEntry {
    pub id: String,
    pub language: String,
    pub unit_type: String,
    pub name: String,
    pub file_path: String,
    pub project_name: Option<String>,
}

pub trait SearchCatalog {
    fn lookup(&self, id: &str) -> Option<SearchCatalogEntry>;
}

fn min_max_normalize(scores: &mut HashMap<String, f64>) {
    if scores.is_empty() {
        return;
    }
    let min = scores.values().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.values().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= f64::EPSILON {
        for v in scores.values_mut() {
            *v = 1.0;
        }
        return;
    }
    for v in scores.values_mut() {
        *v = (*v - min) / range;
    }
}

fn matches_filters(entry: &SearchCatalogEntry, parsed: &ParsedQuery) -> bool {
    for (key, value) in &parsed.filters {
        let matched = match key.as_str() {
            "language" => match value {
                FilterValue::Text(v) => entry.language.eq_ignore_ascii_case(v),
                _ => true,
            },
            "project" => match value {
                FilterValue::Text(v) => entry.project_name.as_deref().map(|p| p.eq_ignore_ascii_case(v)).unwrap_or(false),
                _ => true,
            },
            "file" => match value {
                FilterValue::Text(v) => glob_match(v, &entry.file_path),
                _ => true,
            },
            _ => true,
        };
        if !matched {
            return false;
        }
    }

    for pattern in &parsed.exclusions {
        if glob_match(pattern, &entry.file_path) || entry.file_path.contains(pattern) {
            return false;
        }
    }

    true
}

/// Minimal glob: `*` matches any run of characters, everything else is literal.
fn glob_match(pattern: &str, text: &str) -> bool {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    match Regex::new(&format!("^{escaped}$")) {
        Ok(re) => re.is_match(text),
        Err(_) => text.contains(pattern),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn search<E: Embedder, V: VectorStore, C: SearchCatalog>(
    query_string: &str,
    options: &SearchOptions,
    config: &crate::config::HybridSearchConfig,
    embedder: &E,
    vector_store: &V,
    bm25: &Bm25Index,
    catalog: &C,
) -> Result<SearchResponse, CodeMemError> {
    let parsed = query::parse(query_string)?;
    let k = options.top_k.max(1);
    let k_wide = k.max(config.candidate_floor);

    let mut semantic_scores: HashMap<String, f64> = HashMap::new();
    let mut keyword_scores: HashMap<String, f64> = HashMap::new();

    if options.mode.wants_semantic() {
        let vector = embedder.embed(&parsed.semantic_query)?;
        let filter = vector_store_filter(&parsed);
        let matches = vector_store.query(&vector, k_wide, filter.as_ref())?;
        for m in matches {
            semantic_scores.insert(m.id, m.score as f64);
        }
    }

    if options.mode.wants_keyword() {
        for (id, score) in bm25.search(&parsed.semantic_query, k_wide) {
            keyword_scores.insert(id, score);
        }
    }

    min_max_normalize(&mut semantic_scores);
    min_max_normalize(&mut keyword_scores);

    let alpha = options.mode.alpha(config);
    let mut ids: Vec<String> = semantic_scores.keys().cloned().collect();
    for id in keyword_scores.keys() {
        if !semantic_scores.contains_key(id) {
            ids.push(id.clone());
        }
    }

    let mut fused: Vec<(String, f64)> = ids
        .into_iter()
        .map(|id| {
            let sem = semantic_scores.get(&id).copied().unwrap_or(0.0);
            let key = keyword_scores.get(&id).copied().unwrap_or(0.0);
            (id, alpha * sem + (1.0 - alpha) * key)
        })
        .collect();

    let mut results = Vec::new();
    for (id, mut score) in fused.drain(..) {
        let Some(entry) = catalog.lookup(&id) else { continue };
        if !matches_filters(&entry, &parsed) {
            continue;
        }
        if let Some(weighting) = &options.project_weighting {
            let boost = match &entry.project_name {
                Some(p) if p == &weighting.active_project => weighting.active_boost,
                _ => weighting.other_boost,
            };
            score *= boost;
        }
        results.push((
            score,
            SearchResultItem {
                id,
                score,
                language: entry.language,
                unit_type: entry.unit_type,
                name: entry.name,
                file_path: entry.file_path,
                project_name: entry.project_name,
            },
        ));
    }

    results.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(k);
    let results: Vec<SearchResultItem> = results.into_iter().map(|(_, item)| item).collect();

    let include_projects = options.project.is_none();
    let facets = build_facets(&results, include_projects);
    let summary = summarize(&results, &facets);
    let hints = refinement_hints(&results, &facets, query_string, options.mode.is_keyword());

    Ok(SearchResponse { results, facets, summary, hints })
}

fn vector_store_filter(parsed: &ParsedQuery) -> Option<HashMap<String, String>> {
    let mut filter = HashMap::new();
    for (key, value) in &parsed.filters {
        if matches!(key.as_str(), "language" | "project") {
            if let FilterValue::Text(v) = value {
                filter.insert(key.clone(), v.clone());
            }
        }
    }
    if filter.is_empty() {
        None
    } else {
        Some(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Bm25Config, HybridSearchConfig};
    use crate::external::{HashingEmbedder, InMemoryVectorStore};

    struct FakeCatalog {
        entries: HashMap<String, SearchCatalogEntry>,
    }

    impl SearchCatalog for FakeCatalog {
        fn lookup(&self, id: &str) -> Option<SearchCatalogEntry> {
            self.entries.get(id).cloned()
        }
    }

    fn make_catalog() -> FakeCatalog {
        let mut entries = HashMap::new();
        entries.insert(
            "py1".to_string(),
            SearchCatalogEntry {
                id: "py1".to_string(),
                language: "python".to_string(),
                unit_type: "function".to_string(),
                name: "authenticate_user".to_string(),
                file_path: "auth.py".to_string(),
                project_name: None,
            },
        );
        entries.insert(
            "ts1".to_string(),
            SearchCatalogEntry {
                id: "ts1".to_string(),
                language: "typescript".to_string(),
                unit_type: "function".to_string(),
                name: "authenticateUser".to_string(),
                file_path: "auth.ts".to_string(),
                project_name: None,
            },
        );
        FakeCatalog { entries }
    }

    #[test]
    fn keyword_only_mode_ranks_exact_token_match_higher() {
        let mut bm25 = Bm25Index::new(&Bm25Config::default());
        bm25.add_document("py1".to_string(), "def authenticate_user(username, password):");
        bm25.add_document("ts1".to_string(), "function authenticateUser(user) {");

        let store = InMemoryVectorStore::new();
        let embedder = HashingEmbedder::new(16);
        let catalog = make_catalog();
        let options = SearchOptions { mode: SearchMode::Keyword, ..Default::default() };

        let response = search("authenticate user", &options, &HybridSearchConfig::default(), &embedder, &store, &bm25, &catalog).unwrap();
        assert!(!response.results.is_empty());
        assert_eq!(response.results[0].id, "py1");
    }

    #[test]
    fn file_filter_excludes_non_matching_paths() {
        let mut bm25 = Bm25Index::new(&Bm25Config::default());
        bm25.add_document("py1".to_string(), "def authenticate_user(username, password):");
        bm25.add_document("ts1".to_string(), "function authenticateUser(user) {");
        let store = InMemoryVectorStore::new();
        let embedder = HashingEmbedder::new(16);
        let catalog = make_catalog();
        let options = SearchOptions { mode: SearchMode::Keyword, ..Default::default() };

        let response = search("authenticate language:typescript", &options, &HybridSearchConfig::default(), &embedder, &store, &bm25, &catalog).unwrap();
        assert!(response.results.iter().all(|r| r.language == "typescript"));
    }

    #[test]
    fn bad_query_propagates_without_touching_index() {
        let bm25 = Bm25Index::new(&Bm25Config::default());
        let store = InMemoryVectorStore::new();
        let embedder = HashingEmbedder::new(16);
        let catalog = make_catalog();
        let options = SearchOptions::default();
        let result = search("created:>not-a-date", &options, &HybridSearchConfig::default(), &embedder, &store, &bm25, &catalog);
        assert!(matches!(result, Err(CodeMemError::BadQuery { .. })));
    }

    #[test]
    fn empty_index_yields_empty_results_with_summary() {
        let bm25 = Bm25Index::new(&Bm25Config::default());
        let store = InMemoryVectorStore::new();
        let embedder = HashingEmbedder::new(16);
        let catalog = FakeCatalog { entries: HashMap::new() };
        let options = SearchOptions::default();
        let response = search("anything", &options, &HybridSearchConfig::default(), &embedder, &store, &bm25, &catalog).unwrap();
        assert!(response.results.is_empty());
        assert!(response.summary.starts_with("No results found"));
    }
}
