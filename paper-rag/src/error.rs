//! Typed error for the paper-rag crate.

use std::time::Duration;

use paper_store::StoreError;
use thiserror::Error;

use crate::relevance::RankedResult;

#[derive(Debug, Error)]
pub enum RagError {
    /// Malformed caller input. Never retried.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    /// A referenced chunk vanished from the store.
    #[error("chunk not found: {0}")]
    NotFound(String),

    /// Answer synthesis failed after retrieval succeeded. `partial` keeps the
    /// ranked sources so callers can still inspect them.
    #[error("generation failed: {reason}")]
    GenerationFailed {
        reason: String,
        partial: Box<RankedResult>,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Retrieval worked but nothing matched the question.
    #[error("no relevant context found")]
    NoRelevantContext,

    /// The caller abandoned the query.
    #[error("query cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),
}

impl RagError {
    /// Failures of an external collaborator that the retrieval stage may degrade around.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingUnavailable(_)
                | RagError::IndexUnavailable(_)
                | RagError::Timeout { .. }
        )
    }
}

impl From<StoreError> for RagError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => RagError::NotFound(id),
            StoreError::IndexUnavailable(m) => RagError::IndexUnavailable(m),
            StoreError::EmbeddingUnavailable(m) | StoreError::EmbeddingRejected(m) => {
                RagError::EmbeddingUnavailable(m)
            }
            e @ StoreError::VectorSizeMismatch { .. } => {
                RagError::EmbeddingUnavailable(e.to_string())
            }
            StoreError::Parse(e) => RagError::IndexUnavailable(format!("bad payload: {e}")),
            StoreError::Config(m) => RagError::Config(m),
        }
    }
}
