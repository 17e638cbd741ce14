//! Embedding provider backed by the shared LLM profiles.

use std::sync::Arc;

use ai_llm_service::{AiLlmError, LlmProfiles};
use tracing::warn;

use crate::embed::{EmbeddingsProvider, StoreFuture};
use crate::errors::StoreError;

/// Embeds through `LlmProfiles::embed` and checks the vector dimension.
#[derive(Clone)]
pub struct LlmEmbedder {
    svc: Arc<LlmProfiles>,
    /// Expected embedding dimension; `None` accepts any non-empty vector.
    dim: Option<usize>,
}

impl LlmEmbedder {
    pub fn new(svc: Arc<LlmProfiles>, dim: Option<usize>) -> Self {
        Self { svc, dim }
    }
}

impl EmbeddingsProvider for LlmEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> StoreFuture<'a, Vec<f32>> {
        Box::pin(async move {
            let v = self.svc.embed(text).await.map_err(map_llm_error)?;

            if let Some(want) = self.dim {
                if v.len() != want {
                    return Err(StoreError::VectorSizeMismatch { got: v.len(), want });
                }
            }
            Ok(v)
        })
    }
}

fn map_llm_error(e: AiLlmError) -> StoreError {
    if e.is_transient() {
        warn!(error = %e, "embedding provider unavailable");
        StoreError::EmbeddingUnavailable(e.to_string())
    } else {
        warn!(error = %e, "embedding provider rejected request");
        StoreError::EmbeddingRejected(e.to_string())
    }
}
