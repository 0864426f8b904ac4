//! Vector store dump and reload.
//!
//! A dumped store is a directory with two files:
//!
//! - `index.bin`: the encoded vectors (see [`VectorIndex::encode`])
//! - `chunks.json`: the fragment texts, in index order
//!
//! Both are required to reload. The SHA-256 digest recorded in
//! `index.bin` must match `chunks.json`, so a store whose halves were
//! written by different runs is rejected instead of returning fragments
//! for the wrong vectors.

use std::path::Path;

use anyhow::{Context, Result};

use clauselens_core::index::{fragment_digest_hex, VectorIndex};

pub const INDEX_FILE: &str = "index.bin";
pub const CHUNKS_FILE: &str = "chunks.json";

/// Write `index` to `dir`, creating the directory if needed.
///
/// Returns the hex fragment digest recorded in the dump.
pub fn save_store(dir: &Path, index: &VectorIndex) -> Result<String> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create store directory: {}", dir.display()))?;

    let chunks = serde_json::to_string_pretty(index.fragments())?;
    std::fs::write(dir.join(CHUNKS_FILE), chunks)
        .with_context(|| format!("Failed to write {}", dir.join(CHUNKS_FILE).display()))?;
    std::fs::write(dir.join(INDEX_FILE), index.encode())
        .with_context(|| format!("Failed to write {}", dir.join(INDEX_FILE).display()))?;

    let digest = fragment_digest_hex(index.fragments());
    tracing::info!(
        dir = %dir.display(),
        fragments = index.len(),
        digest = %digest,
        "vector store saved"
    );
    Ok(digest)
}

/// Reload a store written by [`save_store`].
pub fn load_store(dir: &Path) -> Result<VectorIndex> {
    let index_path = dir.join(INDEX_FILE);
    let chunks_path = dir.join(CHUNKS_FILE);

    let bytes = std::fs::read(&index_path)
        .with_context(|| format!("Failed to read {}", index_path.display()))?;
    let chunks = std::fs::read_to_string(&chunks_path)
        .with_context(|| format!("Failed to read {}", chunks_path.display()))?;
    let fragments: Vec<String> = serde_json::from_str(&chunks)
        .with_context(|| format!("Failed to parse {}", chunks_path.display()))?;

    let index = VectorIndex::decode(&bytes, fragments)
        .with_context(|| format!("Vector store at {} is inconsistent", dir.display()))?;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clauselens_core::CoreError;
    use tempfile::TempDir;

    fn sample() -> VectorIndex {
        let mut index = VectorIndex::new();
        index
            .add(
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]],
                &[
                    "rent is due monthly".to_string(),
                    "deposit is refundable".to_string(),
                    "notice of three months".to_string(),
                ],
            )
            .unwrap();
        index
    }

    #[test]
    fn test_round_trip_search_identical() {
        let tmp = TempDir::new().unwrap();
        let index = sample();
        save_store(tmp.path(), &index).unwrap();
        let loaded = load_store(tmp.path()).unwrap();

        let query = [0.9, 0.1];
        assert_eq!(
            loaded.search_scored(&query, 3).unwrap(),
            index.search_scored(&query, 3).unwrap()
        );
    }

    #[test]
    fn test_missing_half_fails() {
        let tmp = TempDir::new().unwrap();
        save_store(tmp.path(), &sample()).unwrap();
        std::fs::remove_file(tmp.path().join(CHUNKS_FILE)).unwrap();
        let err = load_store(tmp.path()).unwrap_err();
        assert!(err.to_string().contains(CHUNKS_FILE));
    }

    #[test]
    fn test_edited_chunks_detected() {
        let tmp = TempDir::new().unwrap();
        save_store(tmp.path(), &sample()).unwrap();
        let edited = serde_json::to_string(&vec![
            "rent is due weekly",
            "deposit is refundable",
            "notice of three months",
        ])
        .unwrap();
        std::fs::write(tmp.path().join(CHUNKS_FILE), edited).unwrap();

        let err = load_store(tmp.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_empty_store_round_trips() {
        let tmp = TempDir::new().unwrap();
        save_store(tmp.path(), &VectorIndex::new()).unwrap();
        let loaded = load_store(tmp.path()).unwrap();
        assert!(loaded.is_empty());
    }
}
