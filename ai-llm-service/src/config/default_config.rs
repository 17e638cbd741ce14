//! Default LLM configs loaded from environment variables.
//!
//! Two roles are resolved per provider:
//!
//! - **Generation** → answer synthesis
//! - **Embedding**  → query/chunk vectors
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_PROVIDER` = `ollama` (default) | `openai`
//! - `LLM_MAX_TOKENS` = optional max tokens (u32)
//! - `LLM_TIMEOUT_SECS` = optional per-request timeout
//!
//! Ollama:
//! - `OLLAMA_URL` or `OLLAMA_PORT` = endpoint (default `http://localhost:11434`)
//! - `OLLAMA_MODEL`                = generation model (mandatory)
//! - `EMBEDDING_MODEL`             = embedding model (mandatory)
//!
//! OpenAI-compatible:
//! - `OPENAI_API_KEY`         (mandatory)
//! - `OPENAI_BASE_URL`        (default `https://api.openai.com`)
//! - `OPENAI_LLM_MODEL`       (default `gpt-4o-mini`)
//! - `OPENAI_EMBEDDING_MODEL` (default `text-embedding-3-small`)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ConfigError, env_opt_u32, env_or, must_env, validate_http_endpoint,
    },
};

const DEFAULT_OLLAMA: &str = "http://localhost:11434";
const DEFAULT_OPENAI: &str = "https://api.openai.com";

/// Reads `LLM_PROVIDER`, defaulting to Ollama.
pub fn provider_from_env() -> Result<LlmProvider, AiLlmError> {
    Ok(env_or("LLM_PROVIDER", "ollama").parse::<LlmProvider>()?)
}

fn timeout_from_env(default: u64) -> Result<u64, AiLlmError> {
    Ok(env_opt_u32("LLM_TIMEOUT_SECS")?
        .map(u64::from)
        .unwrap_or(default))
}

/// Resolves the Ollama endpoint.
///
/// Precedence: `OLLAMA_URL`, then `OLLAMA_PORT` on localhost, then the
/// default local port.
fn ollama_endpoint() -> Result<String, AiLlmError> {
    if let Ok(url) = std::env::var("OLLAMA_URL") {
        if !url.trim().is_empty() {
            validate_http_endpoint("OLLAMA_URL", url.trim())?;
            return Ok(url.trim().to_string());
        }
    }
    if let Ok(port) = std::env::var("OLLAMA_PORT") {
        if !port.trim().is_empty() {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: "OLLAMA_PORT",
                    reason: "expected u16 (1..=65535)",
                })?;
            return Ok(format!("http://localhost:{port}"));
        }
    }
    Ok(DEFAULT_OLLAMA.to_string())
}

fn openai_endpoint() -> Result<String, AiLlmError> {
    let url = env_or("OPENAI_BASE_URL", DEFAULT_OPENAI);
    validate_http_endpoint("OPENAI_BASE_URL", &url)?;
    Ok(url)
}

/// Ollama generation profile. Low temperature keeps answers grounded.
pub fn config_ollama_generation() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: LlmProvider::Ollama,
        model: must_env("OLLAMA_MODEL")?,
        endpoint: ollama_endpoint()?,
        api_key: None,
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: Some(0.2),
        top_p: None,
        timeout_secs: Some(timeout_from_env(120)?),
    })
}

/// Ollama embedding profile.
pub fn config_ollama_embedding() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: LlmProvider::Ollama,
        model: must_env("EMBEDDING_MODEL")?,
        endpoint: ollama_endpoint()?,
        api_key: None,
        max_tokens: None,
        temperature: Some(0.0),
        top_p: None,
        timeout_secs: Some(timeout_from_env(30)?),
    })
}

/// OpenAI-compatible generation profile.
pub fn config_openai_generation() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: LlmProvider::OpenAI,
        model: env_or("OPENAI_LLM_MODEL", "gpt-4o-mini"),
        endpoint: openai_endpoint()?,
        api_key: Some(must_env("OPENAI_API_KEY")?),
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: Some(0.2),
        top_p: None,
        timeout_secs: Some(timeout_from_env(120)?),
    })
}

/// OpenAI-compatible embedding profile.
pub fn config_openai_embedding() -> Result<LlmModelConfig, AiLlmError> {
    Ok(LlmModelConfig {
        provider: LlmProvider::OpenAI,
        model: env_or("OPENAI_EMBEDDING_MODEL", "text-embedding-3-small"),
        endpoint: openai_endpoint()?,
        api_key: Some(must_env("OPENAI_API_KEY")?),
        max_tokens: None,
        temperature: None,
        top_p: None,
        timeout_secs: Some(timeout_from_env(30)?),
    })
}

/// Resolves `(generation, embedding)` for the provider chosen by `LLM_PROVIDER`.
pub fn profiles_from_env() -> Result<(LlmModelConfig, LlmModelConfig), AiLlmError> {
    match provider_from_env()? {
        LlmProvider::Ollama => Ok((config_ollama_generation()?, config_ollama_embedding()?)),
        LlmProvider::OpenAI => Ok((config_openai_generation()?, config_openai_embedding()?)),
    }
}
