//! Retrieval & ranking core for question answering over research papers.
//!
//! Public API: [`RagPipeline::answer`]. A question is normalized and
//! expanded, candidates are recalled by hybrid (semantic + keyword) search,
//! reranked under a per-paper diversity cap, scored onto a 0–100 relevance
//! scale, and handed to an [`AnswerGenerator`] shaped by the [`AnswerMode`].
//! Every finished query is appended to a [`QueryLogSink`].
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use paper_rag::{
//!     AnswerMode, AnswerRequest, Collaborators, ExtractiveGenerator, MemoryQueryLog,
//!     RagConfig, RagPipeline,
//! };
//! use paper_store::{LlmEmbedder, MemoryStore};
//! # use ai_llm_service::{LlmProfiles, config::default_config::profiles_from_env};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let (generation, embedding) = profiles_from_env()?;
//! let llm = Arc::new(LlmProfiles::new(generation, embedding));
//! let store = Arc::new(MemoryStore::new());
//! let pipeline = RagPipeline::new(
//!     RagConfig::default(),
//!     Collaborators {
//!         embedder: Arc::new(LlmEmbedder::new(llm, None)),
//!         index: store.clone(),
//!         store,
//!         generator: Arc::new(ExtractiveGenerator::default()),
//!         log: Arc::new(MemoryQueryLog::new()),
//!     },
//! )?;
//! let out = pipeline
//!     .answer(AnswerRequest::new("what is self-attention", AnswerMode::Concise))
//!     .await?;
//! println!("{}", out.answer);
//! # Ok(()) }
//! ```

mod api_types;
pub mod cache;
mod cancel;
mod candidate;
mod cfg;
mod error;
mod generator;
pub mod hybrid;
pub mod intent;
pub mod keyword;
mod mode;
mod orchestrator;
pub mod prompt;
pub mod quality;
pub mod query;
mod query_log;
pub mod relevance;
pub mod rerank;
mod retriever;
pub mod telemetry;

pub use api_types::{
    AnswerRequest, Caveat, Citation, Diagnostics, MAX_TOP_K, PipelineState, RagAnswer,
};
pub use cache::{Cache, CacheEntry, TtlCache};
pub use cancel::CancelToken;
pub use candidate::{Candidate, SubScores};
pub use cfg::{MAX_EXPANSIONS, RagConfig};
pub use error::RagError;
pub use generator::{
    AnswerGenerator, ExtractiveGenerator, GenFuture, GeneratedAnswer, GenerationError,
    GenerationRequest, LlmGenerator, citations_for,
};
pub use hybrid::{HybridOutcome, fuse_weights, hybrid_search};
pub use intent::{IntentGuess, QueryIntent};
pub use mode::{AnswerMode, ContextScope};
pub use orchestrator::{Collaborators, RagPipeline};
pub use query::Query;
pub use query_log::{
    JsonlQueryLog, LogFuture, MemoryQueryLog, QueryLogEntry, QueryLogSink, QueryStats,
    query_stats,
};
pub use relevance::{RankedResult, Relevance, RelevanceBand};
pub use rerank::{RerankOutcome, diversity_cap, rerank};
pub use retriever::{EmbedCache, Fetched, SearchCache, SemanticRetriever};
