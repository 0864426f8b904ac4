//! Clause discovery stages that run between embedding and naming.
//!
//! ```text
//! corpus paragraphs ─▶ extract_candidates ─▶ (embed) ─▶ Dendrogram
//!                                                          │ cut(1 − similarity)
//!                                                          ▼
//!                          representative ◀── filter_clusters ◀── group_clusters
//! ```
//!
//! A cluster is judged "standard" only when it is both large enough and
//! spread across enough source documents: size alone admits a sentence
//! repeated inside one agreement, coverage alone admits a sentence that
//! appears once per document by chance.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::cluster::Dendrogram;
use crate::embedding::{centroid, cosine_similarity, Embedding};
use crate::error::{CoreError, Result};
use crate::tune::DiscoveryParams;

/// A sentence-like unit taken from one corpus document.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    /// Index of the source document in the corpus.
    pub document: usize,
}

/// Candidates grouped by the clustering cut.
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseCluster {
    /// Candidate indices, ascending.
    pub members: Vec<usize>,
    /// Distinct source documents represented by the members.
    pub documents: BTreeSet<usize>,
}

impl ClauseCluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Fraction of `total_documents` contributing at least one member.
    pub fn coverage(&self, total_documents: usize) -> f64 {
        self.documents.len() as f64 / total_documents.max(1) as f64
    }
}

fn sentence_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.\s+").expect("valid sentence boundary pattern"))
}

/// Split each document's paragraphs into candidate clauses.
///
/// Paragraphs whose trimmed length is not greater than `min_chars`
/// characters are skipped; the rest are split on a period followed by
/// whitespace and every non-empty piece becomes a candidate.
pub fn extract_candidates(documents: &[Vec<String>], min_chars: usize) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for (document, paragraphs) in documents.iter().enumerate() {
        for paragraph in paragraphs {
            let paragraph = paragraph.trim();
            if paragraph.chars().count() <= min_chars {
                continue;
            }
            for part in sentence_boundary().split(paragraph) {
                let part = part.trim();
                if !part.is_empty() {
                    candidates.push(Candidate {
                        text: part.to_string(),
                        document,
                    });
                }
            }
        }
    }
    candidates
}

/// Attach source-document sets to raw index groups.
pub fn group_clusters(groups: Vec<Vec<usize>>, candidates: &[Candidate]) -> Vec<ClauseCluster> {
    groups
        .into_iter()
        .map(|members| {
            let documents = members.iter().map(|&i| candidates[i].document).collect();
            ClauseCluster { members, documents }
        })
        .collect()
}

/// Keep clusters with at least `min_size` members and at least
/// `coverage_threshold` document coverage.
pub fn filter_clusters(
    clusters: Vec<ClauseCluster>,
    min_size: usize,
    coverage_threshold: f64,
    total_documents: usize,
) -> Vec<ClauseCluster> {
    clusters
        .into_iter()
        .filter(|c| c.len() >= min_size && c.coverage(total_documents) >= coverage_threshold)
        .collect()
}

/// Cut `tree` for `params` and return the retained clusters.
pub fn select_clusters(
    tree: &Dendrogram,
    candidates: &[Candidate],
    total_documents: usize,
    params: &DiscoveryParams,
) -> Vec<ClauseCluster> {
    let groups = tree.cut(1.0 - params.similarity_threshold);
    filter_clusters(
        group_clusters(groups, candidates),
        params.min_cluster_size,
        params.coverage_threshold,
        total_documents,
    )
}

/// Member closest to the cluster centroid (first one on ties).
///
/// # Errors
///
/// [`CoreError::InvalidInput`] for an empty cluster or a member index
/// outside `embeddings`; [`CoreError::DimensionMismatch`] when member
/// embeddings disagree in length.
pub fn representative(cluster: &ClauseCluster, embeddings: &[Embedding]) -> Result<usize> {
    let mut vectors = Vec::with_capacity(cluster.len());
    for &m in &cluster.members {
        let v = embeddings
            .get(m)
            .ok_or_else(|| CoreError::invalid(format!("cluster member {} has no embedding", m)))?;
        vectors.push(v.as_slice());
    }
    let center = centroid(vectors.iter().copied())?;

    let mut best: Option<(usize, f32)> = None;
    for (&member, v) in cluster.members.iter().zip(vectors) {
        let score = cosine_similarity(v, &center);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((member, score));
        }
    }
    best.map(|(m, _)| m)
        .ok_or_else(|| CoreError::invalid("representative of an empty cluster"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_splits_sentences() {
        let docs = vec![paragraphs(&[
            "The tenant shall pay rent monthly. The landlord shall maintain the premises.",
        ])];
        let candidates = extract_candidates(&docs, 20);
        let texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "The tenant shall pay rent monthly",
                "The landlord shall maintain the premises."
            ]
        );
    }

    #[test]
    fn test_extract_skips_short_paragraphs() {
        let docs = vec![
            paragraphs(&["SCHEDULE A", "   ", "Exactly twenty chars"]),
            paragraphs(&["This paragraph is long enough to count."]),
        ];
        let candidates = extract_candidates(&docs, 20);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].document, 1);
    }

    #[test]
    fn test_extract_drops_empty_pieces() {
        let docs = vec![paragraphs(&["First clause applies here.   . Second clause."])];
        let candidates = extract_candidates(&docs, 5);
        let texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["First clause applies here", "Second clause."]);
    }

    fn scenario_candidates() -> Vec<Candidate> {
        // 20 candidates over 5 documents
        let docs = [0, 1, 2, 3, 0, 1, 0, 1, 0, 1, 0, 1, 1, 2, 2, 3, 3, 4, 4, 4];
        docs.iter()
            .enumerate()
            .map(|(i, &document)| Candidate {
                text: format!("candidate {}", i),
                document,
            })
            .collect()
    }

    #[test]
    fn test_filter_requires_size_and_coverage() {
        let candidates = scenario_candidates();
        let groups = vec![
            vec![0, 1, 2, 3, 4, 5],       // docs {0,1,2,3}: coverage 0.8
            vec![6, 7, 8, 9, 10, 11],     // docs {0,1}: coverage 0.4
            vec![12, 13, 14, 15, 16],     // docs {1,2,3}: 0.6 but only 5 members
            vec![17, 18, 19],             // too small
        ];
        let clusters = group_clusters(groups, &candidates);
        assert!((clusters[0].coverage(5) - 0.8).abs() < 1e-9);
        assert!((clusters[1].coverage(5) - 0.4).abs() < 1e-9);

        let kept = filter_clusters(clusters.clone(), 5, 0.6, 5);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].members, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(kept[1].members, vec![12, 13, 14, 15, 16]);

        let kept = filter_clusters(clusters, 6, 0.6, 5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].members, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_coverage_with_no_documents() {
        let cluster = ClauseCluster {
            members: vec![0],
            documents: BTreeSet::from([0]),
        };
        assert_eq!(cluster.coverage(0), 1.0);
    }

    #[test]
    fn test_representative_is_closest_to_centroid() {
        let embeddings = vec![
            vec![1.0, 0.0],
            vec![0.7, 0.7],
            vec![0.0, 1.0],
        ];
        let cluster = ClauseCluster {
            members: vec![0, 1, 2],
            documents: BTreeSet::from([0]),
        };
        assert_eq!(representative(&cluster, &embeddings).unwrap(), 1);
    }

    #[test]
    fn test_representative_first_on_tie() {
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]];
        let cluster = ClauseCluster {
            members: vec![1, 2],
            documents: BTreeSet::from([0]),
        };
        assert_eq!(representative(&cluster, &embeddings).unwrap(), 1);
    }

    #[test]
    fn test_representative_rejects_bad_member() {
        let cluster = ClauseCluster {
            members: vec![3],
            documents: BTreeSet::new(),
        };
        let err = representative(&cluster, &[vec![1.0]]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn test_select_clusters_end_to_end() {
        // two tight directions, each present in every one of 3 documents,
        // plus one stray sentence
        let mut candidates = Vec::new();
        let mut embeddings = Vec::new();
        for document in 0..3 {
            candidates.push(Candidate {
                text: format!("rent {}", document),
                document,
            });
            embeddings.push(vec![1.0, 0.01 * document as f32, 0.0]);
            candidates.push(Candidate {
                text: format!("deposit {}", document),
                document,
            });
            embeddings.push(vec![0.0, 1.0, 0.01 * document as f32]);
        }
        candidates.push(Candidate {
            text: "stray".to_string(),
            document: 0,
        });
        embeddings.push(vec![0.0, 0.0, 1.0]);

        let tree = Dendrogram::average_linkage(&embeddings);
        let params = DiscoveryParams {
            similarity_threshold: 0.5,
            coverage_threshold: 0.6,
            min_cluster_size: 3,
        };
        let kept = select_clusters(&tree, &candidates, 3, &params);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].members, vec![0, 2, 4]);
        assert_eq!(kept[1].members, vec![1, 3, 5]);
    }
}
