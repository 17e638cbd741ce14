use crate::errors::StoreError;
use std::{future::Future, pin::Pin};

/// Boxed future returned by the collaborator traits of this crate.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Provider interface for embedding generation.
///
/// Async because real providers (Ollama, OpenAI) perform HTTP requests.
/// Identical input is expected to yield an identical vector.
pub trait EmbeddingsProvider: Send + Sync {
    fn embed<'a>(&'a self, text: &'a str) -> StoreFuture<'a, Vec<f32>>;
}

pub mod llm;
