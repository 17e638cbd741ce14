//! Unified error types for the crate.

use thiserror::Error;

/// Top-level error for paper-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced chunk does not exist (anymore).
    #[error("chunk not found: {0}")]
    NotFound(String),

    /// The similarity-search backend could not be reached or failed.
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    /// The embedding backend could not be reached or answered with a transient failure.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The embedding backend refused the request (bad model, bad payload).
    /// Retrying the same request will not help.
    #[error("embedding rejected: {0}")]
    EmbeddingRejected(String),

    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),

    /// JSON parsing / serialization errors.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Mismatch in vector dimensionality.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },
}

impl StoreError {
    /// Whether one more attempt of the same call is worthwhile.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::IndexUnavailable(_) | StoreError::EmbeddingUnavailable(_)
        )
    }
}
