//! # clauselens core
//!
//! Pure retrieval-and-coverage logic for clauselens: word-window chunking,
//! an exact inner-product vector index, missing-clause detection against a
//! reference set, and the offline clause-discovery algorithms
//! (average-linkage clustering, cluster filtering, representative
//! selection, and parameter auto-tuning).
//!
//! This crate performs no network or filesystem I/O and has no async
//! runtime dependency. Embeddings are plain `Vec<f32>` values supplied by
//! the caller; how they are produced is the application's concern.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chunk`] | Fixed-size word-window fragments |
//! | [`embedding`] | Similarity and vector helpers |
//! | [`index`] | Append-only vector index + binary codec |
//! | [`reference`] | Named reference clause set |
//! | [`coverage`] | Missing-clause detection |
//! | [`cluster`] | Average-linkage hierarchical clustering |
//! | [`discovery`] | Candidate extraction, filtering, representatives |
//! | [`tune`] | Grid-search auto-tuning of discovery parameters |
//! | [`naming`] | Clause title cleanup and disambiguation |

pub mod chunk;
pub mod cluster;
pub mod coverage;
pub mod discovery;
pub mod embedding;
pub mod error;
pub mod index;
pub mod naming;
pub mod reference;
pub mod tune;

pub use error::{CoreError, Result};
