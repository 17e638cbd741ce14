//! Semantic retriever: embedding + nearest-neighbour lookup behind caches.
//!
//! Every external call is bounded by `external_timeout` and retried once
//! after `retry_backoff` when the failure is transient. Results are cached
//! only while the query has not been cancelled.

use std::sync::Arc;

use futures::future::join_all;
use paper_store::{
    Chunk, ChunkStore, EmbeddingsProvider, PaperFilter, SemanticIndex, StoreError, StoreFuture,
};
use tracing::{debug, warn};

use crate::cache::{Cache, TtlCache};
use crate::cancel::CancelToken;
use crate::cfg::RagConfig;
use crate::error::RagError;

pub type EmbedCache = Arc<dyn Cache<Vec<f32>>>;
pub type SearchCache = Arc<dyn Cache<Vec<(String, f32)>>>;

/// Chunks resolved from a hit list; ids whose chunk vanished are reported separately.
#[derive(Debug, Default)]
pub struct Fetched {
    pub chunks: Vec<Chunk>,
    pub dropped: Vec<String>,
}

#[derive(Clone)]
pub struct SemanticRetriever {
    embedder: Arc<dyn EmbeddingsProvider>,
    index: Arc<dyn SemanticIndex>,
    store: Arc<dyn ChunkStore>,
    embed_cache: EmbedCache,
    search_cache: SearchCache,
}

impl SemanticRetriever {
    /// Retriever with fresh in-memory TTL caches.
    pub fn new(
        embedder: Arc<dyn EmbeddingsProvider>,
        index: Arc<dyn SemanticIndex>,
        store: Arc<dyn ChunkStore>,
    ) -> Self {
        Self::with_caches(
            embedder,
            index,
            store,
            Arc::new(TtlCache::new()),
            Arc::new(TtlCache::new()),
        )
    }

    pub fn with_caches(
        embedder: Arc<dyn EmbeddingsProvider>,
        index: Arc<dyn SemanticIndex>,
        store: Arc<dyn ChunkStore>,
        embed_cache: EmbedCache,
        search_cache: SearchCache,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
            embed_cache,
            search_cache,
        }
    }

    /// Query embedding for `text`, served from cache within `embed_cache_ttl`.
    pub async fn embed(
        &self,
        text: &str,
        cfg: &RagConfig,
        cancel: &CancelToken,
    ) -> Result<Vec<f32>, RagError> {
        if let Some(v) = self.embed_cache.get(text) {
            debug!(target: "paper_rag::retriever", "embedding cache hit");
            return Ok(v);
        }
        let embedder = &*self.embedder;
        let v = with_retry("embed", cfg, move || embedder.embed(text)).await?;

        cancel.check()?;
        self.embed_cache
            .set(text.to_string(), v.clone(), cfg.embed_cache_ttl);
        Ok(v)
    }

    /// Up to `limit` `(chunk_id, similarity)` hits for `text`, best first.
    pub async fn nearest(
        &self,
        text: &str,
        limit: usize,
        filter: Option<&PaperFilter>,
        cfg: &RagConfig,
        cancel: &CancelToken,
    ) -> Result<Vec<(String, f32)>, RagError> {
        let key = search_key(text, limit, filter);
        if let Some(hits) = self.search_cache.get(&key) {
            debug!(target: "paper_rag::retriever", hits = hits.len(), "search cache hit");
            return Ok(hits);
        }

        let vector = self.embed(text, cfg, cancel).await?;
        let index = &*self.index;
        let v = vector.as_slice();
        let hits = with_retry("search", cfg, move || index.search(v, limit, filter)).await?;

        cancel.check()?;
        self.search_cache
            .set(key, hits.clone(), cfg.search_cache_ttl);
        Ok(hits)
    }

    /// Resolves chunk ids concurrently. Vanished chunks are dropped, not fatal.
    pub async fn fetch_chunks(&self, ids: &[String], cfg: &RagConfig) -> Result<Fetched, RagError> {
        let store = &*self.store;
        let results = join_all(ids.iter().map(|id| {
            let id = id.as_str();
            with_retry("fetch", cfg, move || store.fetch(id))
        }))
        .await;

        let mut out = Fetched::default();
        for (id, res) in ids.iter().zip(results) {
            match res {
                Ok(chunk) => out.chunks.push(chunk),
                Err(RagError::NotFound(_)) => {
                    warn!(target: "paper_rag::retriever", chunk_id = %id, "chunk vanished, dropping");
                    out.dropped.push(id.clone());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// Lexical-recall source for keyword-only retrieval.
    pub async fn scroll(
        &self,
        filter: Option<&PaperFilter>,
        limit: usize,
        cfg: &RagConfig,
    ) -> Result<Vec<Chunk>, RagError> {
        let store = &*self.store;
        with_retry("scroll", cfg, move || store.scroll(filter, limit)).await
    }
}

fn search_key(text: &str, limit: usize, filter: Option<&PaperFilter>) -> String {
    // Ids are quoted and escaped, so separators inside an id cannot alias
    // another scope.
    let scope = filter
        .map(|f| format!("{:?}", f.paper_ids))
        .unwrap_or_else(|| "*".to_string());
    format!("{limit}|{scope}|{text}")
}

/// Runs `call` under the external timeout; one retry on transient failure.
async fn with_retry<'a, T, F>(operation: &'static str, cfg: &RagConfig, call: F) -> Result<T, RagError>
where
    F: Fn() -> StoreFuture<'a, T>,
{
    let mut attempt = 1;
    loop {
        let err = match tokio::time::timeout(cfg.external_timeout, call()).await {
            Ok(Ok(v)) => return Ok(v),
            Ok(Err(e)) if e.is_retryable() => RagError::from(e),
            Ok(Err(e)) => return Err(rejected(operation, e)),
            Err(_) => RagError::Timeout {
                operation,
                after: cfg.external_timeout,
            },
        };
        if attempt >= 2 {
            return Err(err);
        }
        warn!(target: "paper_rag::retriever", operation, error = %err, "transient failure, retrying once");
        tokio::time::sleep(cfg.retry_backoff).await;
        attempt += 1;
    }
}

fn rejected(operation: &'static str, e: StoreError) -> RagError {
    debug!(target: "paper_rag::retriever", operation, error = %e, "non-retryable failure");
    RagError::from(e)
}
