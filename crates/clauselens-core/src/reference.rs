//! The named reference clause set.
//!
//! A [`ReferenceSet`] is built once (at startup, or at the end of a
//! discovery run) and read concurrently afterwards, so it exposes no
//! mutation after construction.

use std::collections::HashSet;

use crate::embedding::{ensure_dims, Embedding};
use crate::error::{CoreError, Result};

/// A clause considered standard for the document type.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceClause {
    pub name: String,
    pub text: String,
    pub embedding: Embedding,
}

/// Ordered, immutable set of reference clauses with unique names.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    clauses: Vec<ReferenceClause>,
    dims: Option<usize>,
}

impl ReferenceSet {
    /// A set with no clauses. Coverage checks against it report nothing missing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set, keeping the given order.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] for an empty or duplicate name, or an
    ///   empty embedding.
    /// - [`CoreError::DimensionMismatch`] when embeddings differ in length.
    pub fn new(clauses: Vec<ReferenceClause>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut dims = None;
        for clause in &clauses {
            if clause.name.trim().is_empty() {
                return Err(CoreError::invalid("reference clause name must not be empty"));
            }
            if !seen.insert(clause.name.as_str()) {
                return Err(CoreError::invalid(format!(
                    "duplicate reference clause name '{}'",
                    clause.name
                )));
            }
            if clause.embedding.is_empty() {
                return Err(CoreError::invalid(format!(
                    "reference clause '{}' has an empty embedding",
                    clause.name
                )));
            }
            match dims {
                None => dims = Some(clause.embedding.len()),
                Some(d) => ensure_dims(&clause.embedding, d)?,
            }
        }
        Ok(Self { clauses, dims })
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Shared embedding dimensionality, if the set is non-empty.
    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReferenceClause> {
        self.clauses.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.clauses.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ReferenceClause> {
        self.clauses.iter().find(|c| c.name == name)
    }
}

impl<'a> IntoIterator for &'a ReferenceSet {
    type Item = &'a ReferenceClause;
    type IntoIter = std::slice::Iter<'a, ReferenceClause>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(name: &str, embedding: Vec<f32>) -> ReferenceClause {
        ReferenceClause {
            name: name.to_string(),
            text: format!("{} text", name),
            embedding,
        }
    }

    #[test]
    fn test_keeps_order() {
        let set = ReferenceSet::new(vec![
            clause("Rent", vec![1.0, 0.0]),
            clause("Deposit", vec![0.0, 1.0]),
            clause("Notice", vec![1.0, 1.0]),
        ])
        .unwrap();
        assert_eq!(set.names(), vec!["Rent", "Deposit", "Notice"]);
        assert_eq!(set.dims(), Some(2));
        assert_eq!(set.get("Deposit").unwrap().text, "Deposit text");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = ReferenceSet::new(vec![
            clause("Rent", vec![1.0]),
            clause("Rent", vec![0.5]),
        ])
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn test_mixed_dims_rejected() {
        let err = ReferenceSet::new(vec![
            clause("Rent", vec![1.0, 0.0]),
            clause("Deposit", vec![1.0]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            CoreError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_empty_set() {
        let set = ReferenceSet::empty();
        assert!(set.is_empty());
        assert_eq!(set.dims(), None);
    }
}
