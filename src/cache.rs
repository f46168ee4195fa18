//! Persisted state: the content-addressed unit cache and the per-file
//! index, stored as LZ4-frame-compressed bincode with a magic-byte and
//! schema-version header.
//!
//! Grounded in the teacher's `index.rs` (`save_compressed`/
//! `load_compressed`, `LZ4_MAGIC`), generalized from `FileIndex`/
//! `ContentIndex` to the new `FileRecord`/`SemanticUnit` record shape.

use std::collections::HashMap;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CodeMemError;
use crate::types::{FileRecord, Language, SemanticUnit};

pub const MAGIC: &[u8; 4] = b"CMEM";
pub const SCHEMA_VERSION: u8 = 1;

/// One entry per distinct `file_hash` ever seen: the unit list produced
/// the last time that hash was parsed. Valid forever for a given hash.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheEntry {
    pub language: Language,
    pub units: Vec<SemanticUnit>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PersistedState {
    #[serde(default)]
    pub cache: HashMap<String, CacheEntry>,
    #[serde(default)]
    pub file_index: HashMap<String, FileRecord>,
}

pub fn save_compressed<T: Serialize>(path: &Path, data: &T, label: &str) -> Result<(), CodeMemError> {
    let started = Instant::now();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(MAGIC)?;
    writer.write_all(&[SCHEMA_VERSION])?;
    let mut encoder = lz4_flex::frame::FrameEncoder::new(writer);
    bincode::serialize_into(&mut encoder, data)?;
    let mut writer = encoder
        .finish()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    writer.flush()?;

    let size = std::fs::metadata(path)?.len();
    info!(
        label,
        bytes = size,
        elapsed_ms = started.elapsed().as_millis() as u64,
        path = %path.display(),
        "saved compressed cache"
    );
    Ok(())
}

pub fn load_compressed<T: serde::de::DeserializeOwned>(
    path: &Path,
    label: &str,
) -> Result<T, CodeMemError> {
    let started = Instant::now();
    let path_str = path.display().to_string();

    let file = std::fs::File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut header = [0u8; 5];
    reader
        .read_exact(&mut header)
        .map_err(|e| CodeMemError::CorruptCache {
            path: path_str.clone(),
            message: format!("truncated header: {e}"),
        })?;

    if &header[..4] != MAGIC {
        return Err(CodeMemError::CorruptCache {
            path: path_str,
            message: "bad magic bytes".to_string(),
        });
    }
    let schema_version = header[4];
    if schema_version != SCHEMA_VERSION {
        warn!(
            found = schema_version,
            expected = SCHEMA_VERSION,
            "cache schema version mismatch, attempting forward-compatible decode"
        );
    }

    let decoder = lz4_flex::frame::FrameDecoder::new(reader);
    let result: T = bincode::deserialize_from(decoder).map_err(|e| CodeMemError::CorruptCache {
        path: path_str.clone(),
        message: format!("deserialization failed: {e}"),
    })?;

    info!(
        label,
        elapsed_ms = started.elapsed().as_millis() as u64,
        path = %path_str,
        "loaded compressed cache"
    );
    Ok(result)
}

/// Loads an existing cache file, or an empty `PersistedState` if the path
/// doesn't exist yet (first run). A corrupt file is evicted and treated
/// as empty rather than aborting the caller.
pub fn load_or_default(path: &Path) -> PersistedState {
    if !path.exists() {
        return PersistedState::default();
    }
    match load_compressed::<PersistedState>(path, "codemem-cache") {
        Ok(state) => state,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "cache unreadable, starting empty");
            PersistedState::default()
        }
    }
}

pub fn save(path: &Path, state: &PersistedState) -> Result<(), CodeMemError> {
    save_compressed(path, state, "codemem-cache")
}

/// Default cache location when the CLI isn't given an explicit `--cache`:
/// `<platform-data-dir>/codemem/codemem.cache`, falling back to a
/// relative path when the platform data directory can't be resolved.
pub fn default_cache_path() -> std::path::PathBuf {
    match dirs::data_local_dir() {
        Some(base) => base.join("codemem").join("codemem.cache"),
        None => std::path::PathBuf::from("codemem.cache"),
    }
}

/// True when `path`'s byte offsets fall within `current_len` — the
/// consistency check that detects a `CorruptCache` entry whose recorded
/// offsets no longer match the file on disk.
pub fn offsets_consistent(units: &[SemanticUnit], current_len: usize) -> bool {
    units
        .iter()
        .all(|u| (u.start_byte as usize) < current_len && (u.end_byte as usize) <= current_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Language, UnitType};
    use tempfile::tempdir;

    fn sample_state() -> PersistedState {
        let mut state = PersistedState::default();
        let unit = SemanticUnit::new(
            UnitType::Function,
            "foo",
            Language::Python,
            "a.py",
            1,
            2,
            0,
            20,
            "def foo():\n    pass",
        );
        state.cache.insert(
            "somehash".to_string(),
            CacheEntry {
                language: Language::Python,
                units: vec![unit],
            },
        );
        state
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.bin");
        let state = sample_state();
        save(&path, &state).unwrap();
        let loaded: PersistedState = load_compressed(&path, "test").unwrap();
        assert_eq!(loaded.cache.len(), 1);
        assert_eq!(loaded.cache["somehash"].units[0].name, "foo");
    }

    #[test]
    fn bad_magic_bytes_is_corrupt_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.bin");
        std::fs::write(&path, b"XXXXXgarbage").unwrap();
        let result: Result<PersistedState, _> = load_compressed(&path, "test");
        assert!(matches!(result, Err(CodeMemError::CorruptCache { .. })));
    }

    #[test]
    fn missing_file_loads_as_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.bin");
        let state = load_or_default(&path);
        assert!(state.cache.is_empty());
    }

    #[test]
    fn offsets_consistency_check() {
        let unit = SemanticUnit::new(UnitType::Function, "f", Language::Rust, "a.rs", 1, 1, 0, 10, "fn f() {}");
        assert!(offsets_consistent(&[unit.clone()], 20));
        assert!(!offsets_consistent(&[unit], 5));
    }

    #[test]
    fn header_bytes_are_magic_then_schema_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.bin");
        save(&path, &sample_state()).unwrap();
        let mut reader = BufReader::new(std::fs::File::open(&path).unwrap());
        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf[..4], MAGIC);
        assert_eq!(buf[4], SCHEMA_VERSION);
    }
}
