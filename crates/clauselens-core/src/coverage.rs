//! Missing-clause detection.
//!
//! A reference clause counts as present when at least one document
//! fragment is similar enough to it. Only the single best match decides:
//! one well-matched fragment is enough evidence, and long documents with
//! many unrelated fragments are not penalized.
//!
//! The comparison is a dense |clauses| × |fragments| cosine scan; both
//! sides are small.

use crate::embedding::{cosine_similarity, ensure_dims, Embedding};
use crate::error::{CoreError, Result};
use crate::reference::ReferenceSet;

/// Best document match for one reference clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseMatch {
    pub name: String,
    /// Highest cosine similarity over all fragments, `None` for an empty document.
    pub best_score: Option<f32>,
    /// Position of the fragment that produced `best_score`.
    pub best_fragment: Option<usize>,
    pub present: bool,
}

/// Names of reference clauses with no fragment scoring at least `threshold`.
///
/// Names are returned in reference-set order. An empty document misses
/// every clause.
///
/// # Errors
///
/// - [`CoreError::InvalidInput`] when `threshold` is outside `[0, 1]`.
/// - [`CoreError::DimensionMismatch`] when a document embedding disagrees
///   with the reference set dimensionality.
pub fn find_missing(
    document: &[Embedding],
    references: &ReferenceSet,
    threshold: f32,
) -> Result<Vec<String>> {
    Ok(coverage_report(document, references, threshold)?
        .into_iter()
        .filter(|m| !m.present)
        .map(|m| m.name)
        .collect())
}

/// Per-clause best matches, in reference-set order.
///
/// Same error contract as [`find_missing`].
pub fn coverage_report(
    document: &[Embedding],
    references: &ReferenceSet,
    threshold: f32,
) -> Result<Vec<ClauseMatch>> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(CoreError::invalid(format!(
            "coverage threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    if let Some(dims) = references.dims() {
        for e in document {
            ensure_dims(e, dims)?;
        }
    }

    let report = references
        .iter()
        .map(|clause| {
            let mut best: Option<(usize, f32)> = None;
            for (i, fragment) in document.iter().enumerate() {
                let score = cosine_similarity(&clause.embedding, fragment);
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((i, score));
                }
            }
            ClauseMatch {
                name: clause.name.clone(),
                best_score: best.map(|(_, s)| s),
                best_fragment: best.map(|(i, _)| i),
                present: best.is_some_and(|(_, s)| s >= threshold),
            }
        })
        .collect();

    Ok(report)
}
