use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Precondition violations raised by the core algorithms.
///
/// These indicate a caller, configuration, or data bug rather than an
/// environmental failure, so nothing in this crate retries them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A persisted index and its fragment list do not belong together.
    #[error("corrupt vector store: {0}")]
    Corrupt(String),
}

impl CoreError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CoreError::InvalidInput(message.into())
    }
}
