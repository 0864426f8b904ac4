//! Grid search over discovery parameters.
//!
//! The similarity threshold, minimum cluster size, and coverage threshold
//! interact in ways that are hard to predict for a new corpus, so discovery
//! tries every combination from small candidate lists and keeps the one
//! whose retained-cluster count lands closest to a target range.
//!
//! # Scoring
//!
//! A count `c` against target `[min, max]` scores
//! `(distance, |c − ⌊(min + max) / 2⌋|)`, compared lexicographically, where
//! `distance` is 0 inside the range and the gap to the nearest bound
//! outside it.
//!
//! # Iteration order
//!
//! Similarity thresholds are the outer loop, coverage thresholds the middle
//! loop, minimum sizes the inner loop, each in the order given. A later
//! combination replaces the incumbent only with a strictly smaller score,
//! so among equal scores the first one visited wins. Given the same corpus
//! and embeddings the selected parameters are therefore reproducible.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// One point of the search grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryParams {
    /// Clusters are cut at cosine distance `1 − similarity_threshold`.
    pub similarity_threshold: f64,
    /// Minimum fraction of corpus documents a cluster must span.
    pub coverage_threshold: f64,
    /// Minimum number of candidates in a cluster.
    pub min_cluster_size: usize,
}

/// Candidate values for each parameter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchGrid {
    pub similarity: Vec<f64>,
    pub coverage: Vec<f64>,
    pub min_size: Vec<usize>,
}

impl SearchGrid {
    /// Build a grid whose lists start with the `base` values.
    ///
    /// Later repeats of a value are dropped; they could never win under
    /// the strict-improvement rule.
    pub fn with_base(
        base: DiscoveryParams,
        similarity: &[f64],
        coverage: &[f64],
        min_size: &[usize],
    ) -> Self {
        Self {
            similarity: prepend_unique(base.similarity_threshold, similarity),
            coverage: prepend_unique(base.coverage_threshold, coverage),
            min_size: prepend_unique(base.min_cluster_size, min_size),
        }
    }

    /// Number of combinations.
    pub fn len(&self) -> usize {
        self.similarity.len() * self.coverage.len() * self.min_size.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All combinations in search order.
    pub fn combinations(&self) -> impl Iterator<Item = DiscoveryParams> + '_ {
        self.similarity.iter().flat_map(move |&similarity_threshold| {
            self.coverage.iter().flat_map(move |&coverage_threshold| {
                self.min_size
                    .iter()
                    .map(move |&min_cluster_size| DiscoveryParams {
                        similarity_threshold,
                        coverage_threshold,
                        min_cluster_size,
                    })
            })
        })
    }
}

fn prepend_unique<T: Copy + PartialEq>(first: T, rest: &[T]) -> Vec<T> {
    let mut out = vec![first];
    for &v in rest {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

/// Desired number of reference clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetRange {
    min: usize,
    max: usize,
}

impl TargetRange {
    pub fn new(min: usize, max: usize) -> Result<Self> {
        if min > max {
            return Err(CoreError::invalid(format!(
                "target range minimum {} exceeds maximum {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Integer midpoint, rounded down.
    pub fn midpoint(&self) -> usize {
        (self.min + self.max) / 2
    }

    /// 0 inside the range, otherwise the gap to the nearest bound.
    pub fn distance(&self, count: usize) -> usize {
        if count < self.min {
            self.min - count
        } else if count > self.max {
            count - self.max
        } else {
            0
        }
    }

    pub fn score(&self, count: usize) -> TuneScore {
        TuneScore {
            distance: self.distance(count),
            midpoint_gap: count.abs_diff(self.midpoint()),
        }
    }
}

/// Lexicographic score; smaller is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TuneScore {
    pub distance: usize,
    pub midpoint_gap: usize,
}

/// One evaluated grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub params: DiscoveryParams,
    pub count: usize,
    pub score: TuneScore,
}

/// The winning combination and its clusters.
#[derive(Debug, Clone)]
pub struct TuneOutcome<T> {
    pub params: DiscoveryParams,
    pub score: TuneScore,
    pub clusters: Vec<T>,
    pub trials: Vec<Trial>,
}

/// Result of [`auto_tune`].
#[derive(Debug, Clone)]
pub enum Tuned<T> {
    Selected(TuneOutcome<T>),
    /// No combination retained any cluster, or the grid was empty.
    Degraded { trials: Vec<Trial> },
}

impl<T> Tuned<T> {
    pub fn trials(&self) -> &[Trial] {
        match self {
            Tuned::Selected(outcome) => &outcome.trials,
            Tuned::Degraded { trials } => trials,
        }
    }
}

/// Evaluate every grid combination and keep the best-scoring one.
///
/// `evaluate` returns the clusters retained for a parameter combination.
pub fn auto_tune<T, F>(grid: &SearchGrid, target: TargetRange, mut evaluate: F) -> Tuned<T>
where
    F: FnMut(&DiscoveryParams) -> Vec<T>,
{
    let mut trials = Vec::with_capacity(grid.len());
    let mut best: Option<(DiscoveryParams, TuneScore, Vec<T>)> = None;

    for params in grid.combinations() {
        let clusters = evaluate(&params);
        let score = target.score(clusters.len());
        trials.push(Trial {
            params,
            count: clusters.len(),
            score,
        });
        if best.as_ref().map_or(true, |(_, s, _)| score < *s) {
            best = Some((params, score, clusters));
        }
    }

    match best {
        Some((params, score, clusters)) if !clusters.is_empty() => Tuned::Selected(TuneOutcome {
            params,
            score,
            clusters,
            trials,
        }),
        _ => Tuned::Degraded { trials },
    }
}
