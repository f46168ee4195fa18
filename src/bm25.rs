//! Probabilistic keyword ranking over the current unit corpus.
//!
//! Grounded in `original_source/src/search/bm25.py` (`BM25`/`BM25Plus`).
//! The original only supports a one-shot `fit(corpus)`; `add_document` and
//! `remove_document` are a supplement so the index can track an evolving
//! corpus without a full rebuild on every change (see DESIGN.md).

use std::collections::HashMap;

use crate::config::Bm25Config;

/// Lowercase, split on non-alphanumeric-except-underscore, drop tokens
/// shorter than 2 characters. `user_id` stays one token.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            if current.chars().count() >= 2 {
                tokens.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.chars().count() >= 2 {
        tokens.push(current);
    }
    tokens
}

struct Document {
    term_freqs: HashMap<String, u32>,
    len: usize,
}

/// Incrementally maintained BM25(+) index, keyed by caller-chosen document
/// id rather than a dense index.
pub struct Bm25Index {
    k1: f64,
    b: f64,
    delta: f64,
    idf_refresh_fraction: f64,
    docs: HashMap<String, Document>,
    doc_freqs: HashMap<String, u32>,
    idf: HashMap<String, f64>,
    total_len: u64,
    /// Corpus size the last time `idf` was recomputed.
    idf_computed_at_size: usize,
}

impl Bm25Index {
    pub fn new(config: &Bm25Config) -> Self {
        Self {
            k1: config.k1,
            b: config.b,
            delta: 0.0,
            idf_refresh_fraction: config.idf_refresh_fraction,
            docs: HashMap::new(),
            doc_freqs: HashMap::new(),
            idf: HashMap::new(),
            total_len: 0,
            idf_computed_at_size: 0,
        }
    }

    /// BM25+ variant: every per-term contribution gets a `delta` floor so
    /// documents lacking a term can still score above zero when other
    /// query terms match.
    pub fn with_delta(config: &Bm25Config) -> Self {
        let mut index = Self::new(config);
        index.delta = config.delta;
        index
    }

    pub fn num_docs(&self) -> usize {
        self.docs.len()
    }

    fn avgdl(&self) -> f64 {
        if self.docs.is_empty() {
            0.0
        } else {
            self.total_len as f64 / self.docs.len() as f64
        }
    }

    /// Rebuild term frequencies, document frequencies, and IDF from scratch.
    pub fn fit<'a>(&mut self, corpus: impl IntoIterator<Item = (String, &'a str)>) {
        self.docs.clear();
        self.doc_freqs.clear();
        self.total_len = 0;
        for (id, text) in corpus {
            self.insert_document(id, text);
        }
        self.recompute_idf();
    }

    fn insert_document(&mut self, id: String, text: &str) {
        let tokens = tokenize(text);
        let mut term_freqs = HashMap::new();
        for token in &tokens {
            *term_freqs.entry(token.clone()).or_insert(0u32) += 1;
        }
        for token in term_freqs.keys() {
            *self.doc_freqs.entry(token.clone()).or_insert(0) += 1;
        }
        self.total_len += tokens.len() as u64;
        self.docs.insert(
            id,
            Document {
                term_freqs,
                len: tokens.len(),
            },
        );
    }

    fn recompute_idf(&mut self) {
        let n = self.docs.len() as f64;
        self.idf = self
            .doc_freqs
            .iter()
            .map(|(term, df)| {
                let idf = ((n - *df as f64 + 0.5) / (*df as f64 + 0.5) + 1.0).ln();
                (term.clone(), idf)
            })
            .collect();
        self.idf_computed_at_size = self.docs.len();
    }

    fn maybe_refresh_idf(&mut self) {
        let prior = self.idf_computed_at_size.max(1) as f64;
        let delta_fraction = (self.docs.len() as f64 - prior).abs() / prior;
        if delta_fraction > self.idf_refresh_fraction {
            self.recompute_idf();
        }
    }

    /// Replace the document under `id` if present, otherwise insert it.
    pub fn add_document(&mut self, id: impl Into<String>, text: &str) {
        let id = id.into();
        self.remove_document_internal(&id);
        self.insert_document(id, text);
        self.maybe_refresh_idf();
    }

    pub fn remove_document(&mut self, id: &str) {
        self.remove_document_internal(id);
        self.maybe_refresh_idf();
    }

    fn remove_document_internal(&mut self, id: &str) {
        if let Some(doc) = self.docs.remove(id) {
            self.total_len = self.total_len.saturating_sub(doc.len as u64);
            for term in doc.term_freqs.keys() {
                if let Some(df) = self.doc_freqs.get_mut(term) {
                    *df = df.saturating_sub(1);
                    if *df == 0 {
                        self.doc_freqs.remove(term);
                    }
                }
            }
        }
    }

    fn score_document(&self, doc: &Document, query_tokens: &[String]) -> f64 {
        let avgdl = self.avgdl();
        if avgdl == 0.0 {
            return 0.0;
        }
        let mut score = 0.0;
        for term in query_tokens {
            let Some(&idf) = self.idf.get(term) else {
                continue;
            };
            let tf = *doc.term_freqs.get(term).unwrap_or(&0) as f64;
            let numerator = tf * (self.k1 + 1.0);
            let denominator =
                tf + self.k1 * (1.0 - self.b + self.b * (doc.len as f64 / avgdl));
            let contribution = numerator / denominator;
            score += idf * (contribution + self.delta);
        }
        score
    }

    /// Scores for every document in the corpus, not sorted or truncated.
    pub fn get_scores(&self, query: &str) -> HashMap<String, f64> {
        let query_tokens = tokenize(query);
        self.docs
            .iter()
            .map(|(id, doc)| (id.clone(), self.score_document(doc, &query_tokens)))
            .collect()
    }

    /// Top `top_k` `(id, score)` pairs, descending by score.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, f64)> {
        let mut scored: Vec<(String, f64)> = self.get_scores(query).into_iter().collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}
