//! Qdrant-backed [`SemanticIndex`] and [`ChunkStore`].
//!
//! All `qdrant-client` usage lives here so the rest of the workspace only
//! sees the collaborator traits.

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    GetPointsBuilder, PointId, ScrollPointsBuilder, SearchParamsBuilder, SearchPointsBuilder,
};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::embed::StoreFuture;
use crate::errors::StoreError;
use crate::filters::to_qdrant_filter;
use crate::index::{ChunkStore, SemanticIndex};
use crate::mappers::{chunk_from_payload, chunk_id_of, qpayload_to_json, stable_uuid};
use crate::record::{Chunk, PaperFilter};

const SCROLL_PAGE: usize = 256;

/// Chunk collection in Qdrant: one point per chunk, id = UUIDv5(chunk_id).
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    exact: bool,
}

impl QdrantStore {
    /// Builds the client. Does not touch the collection.
    pub fn new(cfg: &StoreConfig) -> Result<Self, StoreError> {
        cfg.validate()?;

        let mut builder = Qdrant::from_url(&cfg.qdrant_url);
        if let Some(key) = &cfg.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::Config(format!("qdrant client: {e}")))?;

        info!(collection = %cfg.collection, exact = cfg.exact_search, "QdrantStore initialized");
        Ok(Self {
            client,
            collection: cfg.collection.clone(),
            exact: cfg.exact_search,
        })
    }

    async fn search_impl(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&PaperFilter>,
    ) -> Result<Vec<(String, f32)>, StoreError> {
        debug!(collection = %self.collection, limit, filtered = filter.is_some(), "qdrant search");

        let mut builder = SearchPointsBuilder::new(&self.collection, vector.to_vec(), limit as u64)
            .with_payload(true);
        if let Some(f) = filter {
            builder = builder.filter(to_qdrant_filter(f));
        }
        if self.exact {
            builder = builder.params(SearchParamsBuilder::default().exact(true));
        }

        let res = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| StoreError::IndexUnavailable(e.to_string()))?;

        let mut out = Vec::with_capacity(res.result.len());
        for p in res.result {
            match chunk_id_of(&p.payload) {
                Some(id) => out.push((id, p.score)),
                None => warn!("qdrant point without chunk_id payload skipped"),
            }
        }
        out.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(out)
    }

    async fn fetch_impl(&self, chunk_id: &str) -> Result<Chunk, StoreError> {
        let pid = PointId::from(stable_uuid(chunk_id).to_string());
        let res = self
            .client
            .get_points(GetPointsBuilder::new(&self.collection, vec![pid]).with_payload(true))
            .await
            .map_err(|e| StoreError::IndexUnavailable(e.to_string()))?;

        let point = res
            .result
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(chunk_id.to_string()))?;
        chunk_from_payload(qpayload_to_json(point.payload))
    }

    async fn scroll_impl(
        &self,
        filter: Option<&PaperFilter>,
        limit: usize,
    ) -> Result<Vec<Chunk>, StoreError> {
        let mut out = Vec::new();
        let mut offset: Option<PointId> = None;

        while out.len() < limit {
            let page = SCROLL_PAGE.min(limit - out.len());
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .limit(page as u32)
                .with_payload(true);
            if let Some(f) = filter {
                builder = builder.filter(to_qdrant_filter(f));
            }
            if let Some(o) = offset.take() {
                builder = builder.offset(o);
            }

            let res = self
                .client
                .scroll(builder)
                .await
                .map_err(|e| StoreError::IndexUnavailable(e.to_string()))?;

            for p in res.result {
                match chunk_from_payload(qpayload_to_json(p.payload)) {
                    Ok(c) => out.push(c),
                    Err(e) => warn!(error = %e, "unreadable chunk payload skipped"),
                }
            }

            match res.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        debug!(collection = %self.collection, returned = out.len(), "qdrant scroll");
        Ok(out)
    }
}

impl SemanticIndex for QdrantStore {
    fn search<'a>(
        &'a self,
        vector: &'a [f32],
        limit: usize,
        filter: Option<&'a PaperFilter>,
    ) -> StoreFuture<'a, Vec<(String, f32)>> {
        Box::pin(self.search_impl(vector, limit, filter))
    }
}

impl ChunkStore for QdrantStore {
    fn fetch<'a>(&'a self, chunk_id: &'a str) -> StoreFuture<'a, Chunk> {
        Box::pin(self.fetch_impl(chunk_id))
    }

    fn scroll<'a>(
        &'a self,
        filter: Option<&'a PaperFilter>,
        limit: usize,
    ) -> StoreFuture<'a, Vec<Chunk>> {
        Box::pin(self.scroll_impl(filter, limit))
    }
}
