//! Shared LLM provider layer for the paper RAG backend.
//!
//! Two logical profiles are exposed through [`LlmProfiles`]:
//! - `generation`: answer synthesis (chat/completion)
//! - `embedding`: query and chunk embeddings
//!
//! Providers: local Ollama and any OpenAI-compatible endpoint.

pub mod config;
pub mod error_handler;
pub mod service_profiles;
pub mod services;

pub use config::llm_model_config::LlmModelConfig;
pub use config::llm_provider::LlmProvider;
pub use error_handler::{AiLlmError, ConfigError, ProviderError, ProviderErrorKind};
pub use service_profiles::LlmProfiles;
