//! Append-only exact nearest-neighbour index over fragment embeddings.
//!
//! A [`VectorIndex`] keeps two positionally parallel sequences: the
//! unit-normalized embeddings and the fragment texts they were computed
//! from. `len(vectors) == len(fragments)` holds after every call; entries
//! are never removed.
//!
//! Embeddings are L2-normalized on insert and queries are normalized the
//! same way, so ranking by inner product is ranking by cosine similarity.
//! Search is brute force over every stored vector: one document yields at
//! most a few hundred fragments, and exact ordering matters more than
//! throughput here.
//!
//! # Persistence codec
//!
//! [`VectorIndex::encode`] produces the vector half of an on-disk dump; the
//! fragment texts are stored separately by the caller and handed back to
//! [`VectorIndex::decode`]. The header records the fragment count and a
//! SHA-256 digest of the fragments so a vector file cannot be paired with
//! the wrong fragment list.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "CLVX"
//! 4       4     format version (u32 LE)
//! 8       4     dimensionality (u32 LE, 0 for an empty index)
//! 12      8     entry count (u64 LE)
//! 20      32    SHA-256 of the fragment list
//! 52      ...   count × dims little-endian f32
//! ```

use sha2::{Digest, Sha256};

use crate::embedding::{blob_to_vec, dot, ensure_dims, l2_normalize, vec_to_blob, Embedding};
use crate::error::{CoreError, Result};

const MAGIC: &[u8; 4] = b"CLVX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8 + 32;

/// A ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Position of the fragment in insertion order.
    pub position: usize,
    /// Cosine similarity to the query.
    pub score: f32,
    /// The fragment text.
    pub text: String,
}

/// Exact inner-product index with a parallel fragment store.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dims: Option<usize>,
    /// Row-major `len × dims` unit vectors.
    vectors: Vec<f32>,
    fragments: Vec<String>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored fragments.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Dimensionality fixed by the first non-empty [`add`](Self::add).
    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    /// All fragments in insertion order.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Unit vector stored at `position`.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let dims = self.dims?;
        if position >= self.len() {
            return None;
        }
        Some(&self.vectors[position * dims..(position + 1) * dims])
    }

    /// Append embeddings and their fragment texts.
    ///
    /// The batch is validated in full before anything is stored, so a
    /// failed call leaves the index unchanged.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] if the two sequences differ in length
    ///   or an embedding is empty.
    /// - [`CoreError::DimensionMismatch`] if an embedding disagrees with the
    ///   index dimensionality (or with the first embedding of the batch
    ///   when the index is still empty).
    pub fn add(&mut self, embeddings: &[Embedding], fragments: &[String]) -> Result<()> {
        if embeddings.len() != fragments.len() {
            return Err(CoreError::invalid(format!(
                "{} embeddings for {} fragments",
                embeddings.len(),
                fragments.len()
            )));
        }
        let Some(first) = embeddings.first() else {
            return Ok(());
        };

        let dims = match self.dims {
            Some(d) => d,
            None if first.is_empty() => {
                return Err(CoreError::invalid("embeddings must have at least one dimension"))
            }
            None => first.len(),
        };
        for e in embeddings {
            ensure_dims(e, dims)?;
        }

        self.dims = Some(dims);
        self.vectors.reserve(embeddings.len() * dims);
        for e in embeddings {
            let start = self.vectors.len();
            self.vectors.extend_from_slice(e);
            l2_normalize(&mut self.vectors[start..]);
        }
        self.fragments.extend(fragments.iter().cloned());
        Ok(())
    }

    /// Return up to `top_k` fragments ordered by descending similarity.
    ///
    /// See [`search_scored`](Self::search_scored) for the error contract.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<String>> {
        Ok(self
            .search_scored(query, top_k)?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    /// Return up to `top_k` hits ordered by descending similarity.
    ///
    /// `top_k` is clamped to the number of stored fragments. Equal scores
    /// keep insertion order. An empty index returns no hits.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] if `top_k` is 0.
    /// - [`CoreError::DimensionMismatch`] if the query length differs from
    ///   the index dimensionality.
    pub fn search_scored(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(CoreError::invalid("top_k must be > 0"));
        }
        let Some(dims) = self.dims else {
            return Ok(Vec::new());
        };
        ensure_dims(query, dims)?;

        let mut q = query.to_vec();
        l2_normalize(&mut q);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(dims)
            .enumerate()
            .map(|(i, v)| (i, dot(&q, v)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k.min(self.len()));

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchHit {
                position,
                score,
                text: self.fragments[position].clone(),
            })
            .collect())
    }

    /// Serialize the vector half of the index (see module docs).
    pub fn encode(&self) -> Vec<u8> {
        let dims = self.dims.unwrap_or(0);
        let mut out = Vec::with_capacity(HEADER_LEN + self.vectors.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(dims as u32).to_le_bytes());
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());
        out.extend_from_slice(&fragment_digest(&self.fragments));
        out.extend_from_slice(&vec_to_blob(&self.vectors));
        out
    }

    /// Rebuild an index from [`encode`](Self::encode) output and its fragments.
    ///
    /// # Errors
    ///
    /// [`CoreError::Corrupt`] when the header is malformed, the payload is
    /// truncated, the fragment count differs, or the fragment digest does
    /// not match.
    pub fn decode(bytes: &[u8], fragments: Vec<String>) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[0..4] != MAGIC {
            return Err(CoreError::Corrupt("missing index header".to_string()));
        }
        let version = u32::from_le_bytes(read_array(&bytes[4..8]));
        if version != FORMAT_VERSION {
            return Err(CoreError::Corrupt(format!(
                "unsupported index format version {}",
                version
            )));
        }
        let dims = u32::from_le_bytes(read_array(&bytes[8..12])) as usize;
        let count = u64::from_le_bytes(read_array(&bytes[12..20])) as usize;
        let digest: [u8; 32] = read_array(&bytes[20..52]);

        if count != fragments.len() {
            return Err(CoreError::Corrupt(format!(
                "index holds {} vectors but {} fragments were supplied",
                count,
                fragments.len()
            )));
        }
        if digest != fragment_digest(&fragments) {
            return Err(CoreError::Corrupt(
                "fragment list does not match the index it was saved with".to_string(),
            ));
        }

        let payload = &bytes[HEADER_LEN..];
        if payload.len() != count * dims * 4 {
            return Err(CoreError::Corrupt(format!(
                "expected {} payload bytes, found {}",
                count * dims * 4,
                payload.len()
            )));
        }
        if count > 0 && dims == 0 {
            return Err(CoreError::Corrupt("non-empty index with zero dimensions".to_string()));
        }

        Ok(Self {
            dims: if count == 0 { None } else { Some(dims) },
            vectors: blob_to_vec(payload),
            fragments,
        })
    }
}

/// SHA-256 over the length-prefixed fragment texts.
pub fn fragment_digest(fragments: &[String]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update((fragments.len() as u64).to_le_bytes());
    for f in fragments {
        hasher.update((f.len() as u64).to_le_bytes());
        hasher.update(f.as_bytes());
    }
    hasher.finalize().into()
}

/// Hex form of [`fragment_digest`], for logs and reports.
pub fn fragment_digest_hex(fragments: &[String]) -> String {
    hex::encode(fragment_digest(fragments))
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
