//! Paper chunk model and the retrieval collaborators used by the RAG core.
//!
//! This crate provides:
//! - [`Chunk`] / [`PaperMeta`] data models
//! - Contracts: [`EmbeddingsProvider`], [`SemanticIndex`], [`ChunkStore`]
//! - Implementations: [`QdrantStore`] (production), [`MemoryStore`] (in-process),
//!   [`LlmEmbedder`] (embeddings through `ai-llm-service`)

mod config;
pub mod embed;
mod errors;
mod filters;
mod index;
pub mod mappers;
mod memory;
mod qdrant_facade;
mod record;

pub use config::StoreConfig;
pub use embed::llm::LlmEmbedder;
pub use embed::{EmbeddingsProvider, StoreFuture};
pub use errors::StoreError;
pub use index::{ChunkStore, SemanticIndex};
pub use memory::{MemoryStore, cosine};
pub use qdrant_facade::QdrantStore;
pub use record::{Chunk, PaperFilter, PaperMeta, admits};
