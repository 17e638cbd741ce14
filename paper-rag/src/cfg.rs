//! Runtime configuration loaded from environment variables.
//!
//! A query captures one `Arc<RagConfig>` when it starts and never looks at
//! live configuration again.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::RagError;

/// Upper bound on expansion variants per query.
pub const MAX_EXPANSIONS: usize = 5;

/// Tunables of the retrieval and ranking core. All fields have defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct RagConfig {
    // Fusion
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    /// Share of the Jaccard term inside the keyword score; precision gets the rest.
    pub keyword_jaccard_share: f32,

    // Diversity
    pub diversity_divisor: usize,
    /// Stricter divisor for modes that need several distinct papers.
    pub compare_diversity_divisor: usize,

    pub max_expansions: usize,

    // Caching
    pub embed_cache_ttl: Duration,
    pub search_cache_ttl: Duration,

    // External calls
    pub external_timeout: Duration,
    pub generation_timeout: Duration,
    pub retry_backoff: Duration,

    /// How many chunks keyword-only retrieval scans when vector search is down.
    pub keyword_scan_limit: usize,
    pub max_ctx_chars: usize,
    pub extractive_fallback: bool,
    pub query_log_path: PathBuf,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            keyword_jaccard_share: 0.5,
            diversity_divisor: 3,
            compare_diversity_divisor: 4,
            max_expansions: MAX_EXPANSIONS,
            embed_cache_ttl: Duration::from_secs(3600),
            search_cache_ttl: Duration::from_secs(1800),
            external_timeout: Duration::from_secs(30),
            generation_timeout: Duration::from_secs(120),
            retry_backoff: Duration::from_millis(250),
            keyword_scan_limit: 500,
            max_ctx_chars: 8500,
            extractive_fallback: true,
            query_log_path: PathBuf::from("query_logs.jsonl"),
        }
    }
}

impl RagConfig {
    /// Build from environment variables with defaults, then validate.
    pub fn from_env() -> Result<Self, RagError> {
        let d = Self::default();
        let cfg = Self {
            semantic_weight: parse("RAG_SEMANTIC_WEIGHT", d.semantic_weight),
            keyword_weight: parse("RAG_KEYWORD_WEIGHT", d.keyword_weight),
            keyword_jaccard_share: parse("RAG_KEYWORD_JACCARD_SHARE", d.keyword_jaccard_share),
            diversity_divisor: parse("RAG_DIVERSITY_DIVISOR", d.diversity_divisor),
            compare_diversity_divisor: parse(
                "RAG_COMPARE_DIVERSITY_DIVISOR",
                d.compare_diversity_divisor,
            ),
            max_expansions: parse("RAG_MAX_EXPANSIONS", d.max_expansions),
            embed_cache_ttl: Duration::from_secs(parse("RAG_EMBED_CACHE_TTL_SECS", 3600u64)),
            search_cache_ttl: Duration::from_secs(parse("RAG_SEARCH_CACHE_TTL_SECS", 1800u64)),
            external_timeout: Duration::from_secs(parse("RAG_EXTERNAL_TIMEOUT_SECS", 30u64)),
            generation_timeout: Duration::from_secs(parse("RAG_GENERATION_TIMEOUT_SECS", 120u64)),
            retry_backoff: Duration::from_millis(parse("RAG_RETRY_BACKOFF_MS", 250u64)),
            keyword_scan_limit: parse("RAG_KEYWORD_SCAN_LIMIT", d.keyword_scan_limit),
            max_ctx_chars: parse("RAG_MAX_CTX_CHARS", d.max_ctx_chars),
            extractive_fallback: env("RAG_EXTRACTIVE_FALLBACK", "true") == "true",
            query_log_path: PathBuf::from(env("QUERY_LOG_PATH", "query_logs.jsonl")),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects values the pipeline cannot work with.
    ///
    /// Both fusion weights at zero is accepted; fusion falls back to equal weighting.
    pub fn validate(&self) -> Result<(), RagError> {
        let weight_ok = |w: f32| w.is_finite() && w >= 0.0;
        if !weight_ok(self.semantic_weight) || !weight_ok(self.keyword_weight) {
            return Err(RagError::Config(
                "fusion weights must be finite and non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.keyword_jaccard_share) {
            return Err(RagError::Config(
                "keyword_jaccard_share must be within 0.0..=1.0".into(),
            ));
        }
        if self.diversity_divisor == 0 || self.compare_diversity_divisor == 0 {
            return Err(RagError::Config("diversity divisors must be >= 1".into()));
        }
        if self.max_expansions > MAX_EXPANSIONS {
            return Err(RagError::Config(format!(
                "max_expansions must be <= {MAX_EXPANSIONS}"
            )));
        }
        if self.external_timeout.is_zero() || self.generation_timeout.is_zero() {
            return Err(RagError::Config("timeouts must be > 0".into()));
        }
        if self.keyword_scan_limit == 0 {
            return Err(RagError::Config("keyword_scan_limit must be > 0".into()));
        }
        Ok(())
    }
}

fn env(k: &str, dflt: &str) -> String {
    std::env::var(k).unwrap_or_else(|_| dflt.to_string())
}

fn parse<T: std::str::FromStr>(k: &str, dflt: T) -> T {
    std::env::var(k)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(dflt)
}
