//! Word-window text chunker.
//!
//! Splits extracted document text into fragments of exactly `size`
//! whitespace-separated words (the last fragment may be shorter). Words
//! inside a fragment are re-joined with single spaces, so line breaks and
//! runs of whitespace in the source collapse.
//!
//! A fragment has no identity beyond its position in the returned vector,
//! which is why the function is deterministic and order-preserving.
//!
//! # Example
//!
//! ```rust
//! use clauselens_core::chunk::chunk_words;
//!
//! let fragments = chunk_words("The tenant shall pay rent monthly.", 3).unwrap();
//! assert_eq!(fragments, vec!["The tenant shall", "pay rent monthly."]);
//! ```

use crate::error::{CoreError, Result};

/// Split `text` into fragments of `size` words.
///
/// # Errors
///
/// Returns [`CoreError::InvalidInput`] when `text` is empty or `size` is 0.
/// Whitespace-only text is accepted and yields no fragments.
pub fn chunk_words(text: &str, size: usize) -> Result<Vec<String>> {
    if text.is_empty() {
        return Err(CoreError::invalid("text to chunk must not be empty"));
    }
    if size == 0 {
        return Err(CoreError::invalid("chunk size must be > 0"));
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let fragments = words
        .chunks(size)
        .map(|group| group.join(" "))
        .filter(|fragment| !fragment.trim().is_empty())
        .collect();

    Ok(fragments)
}

/// Number of whitespace-separated words in a fragment.
pub fn word_count(fragment: &str) -> usize {
    fragment.split_whitespace().count()
}
