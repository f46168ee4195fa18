//! Criterion benchmarks for the incremental indexer's core operations.
//!
//! Run with: `cargo bench`
//!
//! Synthetic data throughout so results are reproducible across machines.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use codemem::bm25::{tokenize, Bm25Index};
use codemem::cache::{CacheEntry, PersistedState};
use codemem::config::Bm25Config;
use codemem::parser::parse_source_file;
use codemem::types::{FileRecord, Language, UnitType};

// ─── Helpers ─────────────────────────────────────────────────────────

fn synthetic_python_file(num_functions: usize) -> String {
    let mut src = String::new();
    for i in 0..num_functions {
        src.push_str(&format!(
            "def handler_{i}(request, context):\n    logger.info(\"handling request {i}\")\n    return process(request)\n\n"
        ));
    }
    src
}

fn synthetic_corpus(num_docs: usize, words_per_doc: usize) -> Vec<(String, String)> {
    (0..num_docs)
        .map(|i| {
            let mut text = String::new();
            for w in 0..words_per_doc {
                text.push_str(&format!("token_{} ", w % 200));
            }
            text.push_str("class public void return using namespace");
            if i % 100 == 0 {
                text.push_str(" rarehttpclient");
            }
            (format!("doc_{i}"), text)
        })
        .collect()
}

fn synthetic_persisted_state(num_files: usize, units_per_file: usize) -> PersistedState {
    let mut state = PersistedState::default();
    for f in 0..num_files {
        let file_path = format!("src/file_{f}.py");
        let mut unit_ids = Vec::with_capacity(units_per_file);
        let mut unit_names = Vec::with_capacity(units_per_file);
        let mut units = Vec::with_capacity(units_per_file);
        for u in 0..units_per_file {
            let name = format!("func_{u}");
            let unit = codemem::types::SemanticUnit::new(
                UnitType::Function,
                name.clone(),
                Language::Python,
                file_path.clone(),
                (u * 3) as u32 + 1,
                (u * 3) as u32 + 3,
                0,
                100,
                "def f():\n    pass\n",
            );
            unit_ids.push(unit.stable_id(0));
            unit_names.push(name);
            units.push(unit);
        }
        let file_hash = format!("hash_{f}");
        state.cache.insert(
            file_hash.clone(),
            CacheEntry {
                language: Language::Python,
                units,
            },
        );
        state.file_index.insert(
            file_path.clone(),
            FileRecord {
                file_path,
                file_hash,
                language: Language::Python,
                last_indexed_at: 0,
                unit_names,
                unit_ids,
            },
        );
    }
    state
}

// ─── Tokenizer ───────────────────────────────────────────────────────

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_tokenize");

    let short = "user_id = get_user_id(session.token)";
    let long = "def authenticate_user(username, password, session_store, max_attempts=5):\n    if session_store.is_locked(username):\n        raise AuthenticationError(\"account locked\")\n";

    group.bench_function("short_line", |b| b.iter(|| tokenize(black_box(short))));
    group.bench_function("function_body", |b| b.iter(|| tokenize(black_box(long))));

    group.finish();
}

// ─── BM25 scoring ────────────────────────────────────────────────────

fn bench_bm25_fit_and_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_scoring");

    for &num_docs in &[1_000, 10_000, 50_000] {
        let corpus = synthetic_corpus(num_docs, 200);

        group.bench_with_input(BenchmarkId::new("fit", num_docs), &corpus, |b, corpus| {
            b.iter(|| {
                let mut index = Bm25Index::new(&Bm25Config::default());
                index.fit(corpus.iter().map(|(id, text)| (id.clone(), text.as_str())));
                black_box(index.num_docs());
            })
        });

        let mut index = Bm25Index::new(&Bm25Config::default());
        index.fit(corpus.iter().map(|(id, text)| (id.clone(), text.as_str())));

        group.bench_with_input(BenchmarkId::new("search_single_term", num_docs), &index, |b, index| {
            b.iter(|| black_box(index.search("rarehttpclient", 10)))
        });

        group.bench_with_input(BenchmarkId::new("search_multi_term", num_docs), &index, |b, index| {
            b.iter(|| black_box(index.search("token_1 token_42 rarehttpclient", 10)))
        });
    }

    group.finish();
}

fn bench_bm25_incremental_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_incremental");
    group.sample_size(20);

    for &num_docs in &[1_000, 10_000] {
        let corpus = synthetic_corpus(num_docs, 200);

        group.bench_with_input(BenchmarkId::new("add_one_document", num_docs), &corpus, |b, corpus| {
            let mut index = Bm25Index::new(&Bm25Config::default());
            index.fit(corpus.iter().map(|(id, text)| (id.clone(), text.as_str())));
            b.iter(|| {
                index.add_document("incoming", "class public void token_7 rarehttpclient");
            })
        });
    }

    group.finish();
}

// ─── Parser dispatch ─────────────────────────────────────────────────

fn bench_parser_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_dispatch");

    for &num_functions in &[10, 100, 1_000] {
        let source = synthetic_python_file(num_functions);

        group.bench_with_input(BenchmarkId::new("python_file", num_functions), &source, |b, source| {
            b.iter(|| black_box(parse_source_file("bench.py", source).unwrap()))
        });
    }

    group.bench_function("unknown_extension", |b| {
        b.iter(|| black_box(parse_source_file("bench.bin", "irrelevant content").unwrap()))
    });

    group.finish();
}

// ─── Cache load/save ─────────────────────────────────────────────────

fn bench_cache_persistence(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_persistence");
    group.sample_size(10);

    for &num_files in &[100, 1_000, 5_000] {
        let state = synthetic_persisted_state(num_files, 5);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.cache");

        group.bench_with_input(BenchmarkId::new("save", num_files), &state, |b, state| {
            b.iter(|| {
                codemem::cache::save_compressed(&path, state, "bench").unwrap();
            })
        });

        codemem::cache::save_compressed(&path, &state, "bench").unwrap();

        group.bench_with_input(BenchmarkId::new("load", num_files), &path, |b, path| {
            b.iter(|| {
                let loaded: PersistedState = codemem::cache::load_compressed(path, "bench").unwrap();
                black_box(loaded.file_index.len());
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_tokenize,
    bench_bm25_fit_and_search,
    bench_bm25_incremental_update,
    bench_parser_dispatch,
    bench_cache_persistence,
);
criterion_main!(benches);
