//! Qdrant connection and collection configuration.

use crate::errors::StoreError;

/// Configuration for the Qdrant-backed chunk index.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Qdrant gRPC endpoint, e.g. `http://localhost:6334`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Collection holding paper chunks.
    pub collection: String,
    /// Exact search flag (false = HNSW ANN).
    pub exact_search: bool,
    /// Expected embedding length; `None` skips the dimension check.
    pub embedding_dim: Option<usize>,
}

impl StoreConfig {
    pub fn new_default(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            qdrant_url: url.into(),
            qdrant_api_key: None,
            collection: collection.into(),
            exact_search: false,
            embedding_dim: None,
        }
    }

    /// Reads `QDRANT_URL`, `QDRANT_API_KEY`, `QDRANT_COLLECTION`, `RAG_EXACT_SEARCH`,
    /// `EMBEDDING_DIM`.
    pub fn from_env() -> Result<Self, StoreError> {
        let env = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());

        let cfg = Self {
            qdrant_url: env("QDRANT_URL").unwrap_or_else(|| "http://localhost:6334".into()),
            qdrant_api_key: env("QDRANT_API_KEY"),
            collection: env("QDRANT_COLLECTION").unwrap_or_else(|| "paper_chunks".into()),
            exact_search: env("RAG_EXACT_SEARCH")
                .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
                .unwrap_or(false),
            embedding_dim: parse_dim(env("EMBEDDING_DIM"))?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.qdrant_url.trim().is_empty() {
            return Err(StoreError::Config("qdrant_url is empty".into()));
        }
        if !(self.qdrant_url.starts_with("http://") || self.qdrant_url.starts_with("https://")) {
            return Err(StoreError::Config(
                "qdrant_url must start with http:// or https://".into(),
            ));
        }
        if self.collection.trim().is_empty() {
            return Err(StoreError::Config("collection is empty".into()));
        }
        if self.embedding_dim == Some(0) {
            return Err(StoreError::Config("embedding_dim must be positive".into()));
        }
        Ok(())
    }
}

fn parse_dim(raw: Option<String>) -> Result<Option<usize>, StoreError> {
    raw.map(|v| {
        v.trim()
            .parse::<usize>()
            .map_err(|e| StoreError::Config(format!("EMBEDDING_DIM `{v}`: {e}")))
    })
    .transpose()
}
