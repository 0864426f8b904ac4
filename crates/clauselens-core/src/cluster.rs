//! Average-linkage agglomerative clustering under cosine distance.
//!
//! [`Dendrogram::average_linkage`] builds the full merge tree once; flat
//! clusters for any distance threshold are then read off with
//! [`Dendrogram::cut`]. Discovery auto-tuning cuts the same tree at several
//! thresholds, so the O(n²) build is paid once per run.
//!
//! # Algorithm
//!
//! Nearest-neighbour chain over a condensed distance matrix:
//!
//! 1. Distances are `1 − cos(a, b)`; a zero vector is at distance 1 from
//!    everything.
//! 2. Follow nearest neighbours from an active cluster until two clusters
//!    are each other's nearest neighbour, then merge them.
//! 3. The merged cluster's distances follow the Lance–Williams update for
//!    average linkage: `d(k, a∪b) = (|a|·d(k,a) + |b|·d(k,b)) / (|a|+|b|)`.
//!
//! Average linkage is reducible, so the chain stays valid after a merge
//! and the result is the exact UPGMA tree. When several neighbours are
//! equally near, the previous chain element is preferred, then the lowest
//! index, which keeps the chain from cycling and the output deterministic.

use std::collections::HashMap;

use crate::embedding::cosine_similarity;

/// One merge step. `left` and `right` are point indices, one from each side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
}

/// A complete average-linkage merge tree over `n` points.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    points: usize,
    /// `points - 1` merges sorted by non-decreasing distance.
    merges: Vec<Merge>,
}

impl Dendrogram {
    /// Build the tree for `embeddings` using cosine distance.
    pub fn average_linkage(embeddings: &[Vec<f32>]) -> Self {
        let n = embeddings.len();
        if n < 2 {
            return Self {
                points: n,
                merges: Vec::new(),
            };
        }

        let mut dist = vec![0.0f64; n * (n - 1) / 2];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = 1.0 - cosine_similarity(&embeddings[i], &embeddings[j]) as f64;
                dist[condensed(n, i, j)] = d.clamp(0.0, 2.0);
            }
        }

        let mut size = vec![1usize; n];
        let mut active = vec![true; n];
        let mut chain: Vec<usize> = Vec::with_capacity(n);
        let mut merges = Vec::with_capacity(n - 1);

        'build: while merges.len() < n - 1 {
            if chain.is_empty() {
                if let Some(first) = active.iter().position(|&a| a) {
                    chain.push(first);
                }
            }

            let (x, y, d) = loop {
                let x = chain[chain.len() - 1];
                let prev = if chain.len() >= 2 {
                    Some(chain[chain.len() - 2])
                } else {
                    None
                };

                let mut best = prev;
                let mut best_d = prev.map_or(f64::INFINITY, |p| dist[condensed(n, x, p)]);
                for k in 0..n {
                    if !active[k] || k == x {
                        continue;
                    }
                    let d = dist[condensed(n, x, k)];
                    if d < best_d {
                        best = Some(k);
                        best_d = d;
                    }
                }

                let Some(best) = best else {
                    break 'build;
                };
                if Some(best) == prev {
                    break (x, best, best_d);
                }
                chain.push(best);
            };
            chain.truncate(chain.len() - 2);

            // x is absorbed into y's slot.
            let (sx, sy) = (size[x] as f64, size[y] as f64);
            for k in 0..n {
                if !active[k] || k == x || k == y {
                    continue;
                }
                let merged = (sx * dist[condensed(n, k, x)] + sy * dist[condensed(n, k, y)])
                    / (sx + sy);
                dist[condensed(n, k, y)] = merged;
            }
            active[x] = false;
            size[y] += size[x];

            merges.push(Merge {
                left: x.min(y),
                right: x.max(y),
                distance: d,
            });
        }

        merges.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Self { points: n, merges }
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points == 0
    }

    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Flat clusters formed by every merge with distance strictly below `threshold`.
    ///
    /// Clusters are ordered by their smallest member; members are ascending.
    pub fn cut(&self, threshold: f64) -> Vec<Vec<usize>> {
        let mut parent: Vec<usize> = (0..self.points).collect();
        let mut rank: Vec<usize> = vec![0; self.points];

        fn find(parent: &mut [usize], i: usize) -> usize {
            if parent[i] != i {
                parent[i] = find(parent, parent[i]);
            }
            parent[i]
        }

        fn union(parent: &mut [usize], rank: &mut [usize], i: usize, j: usize) {
            let pi = find(parent, i);
            let pj = find(parent, j);
            if pi != pj {
                if rank[pi] < rank[pj] {
                    parent[pi] = pj;
                } else if rank[pi] > rank[pj] {
                    parent[pj] = pi;
                } else {
                    parent[pj] = pi;
                    rank[pi] += 1;
                }
            }
        }

        for merge in self.merges.iter().take_while(|m| m.distance < threshold) {
            union(&mut parent, &mut rank, merge.left, merge.right);
        }

        let mut slot: HashMap<usize, usize> = HashMap::new();
        let mut clusters: Vec<Vec<usize>> = Vec::new();
        for i in 0..self.points {
            let root = find(&mut parent, i);
            let idx = *slot.entry(root).or_insert_with(|| {
                clusters.push(Vec::new());
                clusters.len() - 1
            });
            clusters[idx].push(i);
        }
        clusters
    }
}

/// Offset of pair `(i, j)` in a condensed upper-triangular matrix.
fn condensed(n: usize, i: usize, j: usize) -> usize {
    let (i, j) = if i < j { (i, j) } else { (j, i) };
    n * i - i * (i + 1) / 2 + (j - i - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condensed_offsets() {
        let n = 4;
        let offsets: Vec<usize> = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]
            .iter()
            .map(|&(i, j)| condensed(n, i, j))
            .collect();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(condensed(n, 3, 1), condensed(n, 1, 3));
    }

    #[test]
    fn test_empty_and_single() {
        let empty = Dendrogram::average_linkage(&[]);
        assert!(empty.cut(0.5).is_empty());

        let single = Dendrogram::average_linkage(&[vec![1.0, 0.0]]);
        assert_eq!(single.cut(0.5), vec![vec![0]]);
    }

    #[test]
    fn test_merge_count() {
        let points: Vec<Vec<f32>> = (0..7)
            .map(|i| vec![1.0, i as f32 * 0.3, (i % 3) as f32])
            .collect();
        let tree = Dendrogram::average_linkage(&points);
        assert_eq!(tree.merges().len(), 6);
        for pair in tree.merges().windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_average_linkage_distance() {
        // d(a,b)=0.2, d(b,c)=0.4, d(a,c)=1.0; average of the last merge is 0.7
        let points = vec![vec![1.0, 0.0], vec![0.8, 0.6], vec![0.0, 1.0]];
        let tree = Dendrogram::average_linkage(&points);
        let merges = tree.merges();
        assert_eq!((merges[0].left, merges[0].right), (0, 1));
        assert!((merges[0].distance - 0.2).abs() < 1e-5);
        assert!((merges[1].distance - 0.7).abs() < 1e-5);

        assert_eq!(tree.cut(0.65), vec![vec![0, 1], vec![2]]);
        assert_eq!(tree.cut(0.75), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_cut_is_strict() {
        let points = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let tree = Dendrogram::average_linkage(&points);
        assert_eq!(tree.cut(0.0), vec![vec![0], vec![1], vec![2]]);
        assert_eq!(tree.cut(0.5), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_two_groups_interleaved() {
        let points = vec![
            vec![1.0, 0.02],
            vec![0.02, 1.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.05],
        ];
        let tree = Dendrogram::average_linkage(&points);
        assert_eq!(tree.cut(0.5), vec![vec![0, 2, 4], vec![1, 3]]);
    }

    #[test]
    fn test_zero_vectors_are_far() {
        let points = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.01]];
        let tree = Dendrogram::average_linkage(&points);
        assert_eq!(tree.cut(0.5), vec![vec![0], vec![1, 2]]);
    }

    #[test]
    fn test_deterministic() {
        let points: Vec<Vec<f32>> = (0..12)
            .map(|i| vec![(i as f32).sin(), (i as f32).cos(), 0.5])
            .collect();
        let a = Dendrogram::average_linkage(&points);
        let b = Dendrogram::average_linkage(&points);
        assert_eq!(a.merges(), b.merges());
    }
}
