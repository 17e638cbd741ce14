use crate::config::llm_provider::LlmProvider;

/// Configuration for one model invocation profile.
///
/// # Fields
///
/// - `provider`: backend (Ollama, OpenAI-compatible).
/// - `model`: model identifier (e.g. `"llama3.1:8b"`, `"text-embedding-3-small"`).
/// - `endpoint`: base URL of the server, without the API path.
/// - `api_key`: bearer token for providers that require it.
/// - `max_tokens`: generation cap, ignored for embeddings.
/// - `temperature` / `top_p`: sampling knobs, ignored for embeddings.
/// - `timeout_secs`: per-request timeout applied to the HTTP client.
///
/// # Examples
///
/// ```
/// use ai_llm_service::{LlmModelConfig, LlmProvider};
///
/// let cfg = LlmModelConfig {
///     provider: LlmProvider::Ollama,
///     model: "nomic-embed-text".to_string(),
///     endpoint: "http://localhost:11434".to_string(),
///     api_key: None,
///     max_tokens: None,
///     temperature: Some(0.0),
///     top_p: None,
///     timeout_secs: Some(30),
/// };
/// assert_eq!(cfg.timeout_secs, Some(30));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LlmModelConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Request timeout, defaulting to 60 seconds when unset.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs.unwrap_or(60))
    }
}
