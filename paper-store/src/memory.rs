//! In-process chunk store with brute-force cosine search.
//!
//! Suitable for small collections and for tests; implements the same
//! contracts as [`crate::QdrantStore`].

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::embed::StoreFuture;
use crate::errors::StoreError;
use crate::index::{ChunkStore, SemanticIndex};
use crate::record::{Chunk, PaperFilter, admits};

#[derive(Default)]
pub struct MemoryStore {
    chunks: RwLock<HashMap<String, Chunk>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        let map = chunks.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self {
            chunks: RwLock::new(map),
        }
    }

    /// Inserts or replaces a chunk by id.
    pub async fn upsert(&self, chunk: Chunk) {
        self.chunks.write().await.insert(chunk.id.clone(), chunk);
    }

    pub async fn remove(&self, chunk_id: &str) -> Option<Chunk> {
        self.chunks.write().await.remove(chunk_id)
    }

    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }
}

impl SemanticIndex for MemoryStore {
    fn search<'a>(
        &'a self,
        vector: &'a [f32],
        limit: usize,
        filter: Option<&'a PaperFilter>,
    ) -> StoreFuture<'a, Vec<(String, f32)>> {
        Box::pin(async move {
            let guard = self.chunks.read().await;
            let mut scored: Vec<(String, f32)> = guard
                .values()
                .filter(|c| !c.embedding.is_empty() && admits(filter, &c.paper_id))
                .map(|c| (c.id.clone(), cosine(vector, &c.embedding)))
                .collect();

            scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            scored.truncate(limit);
            Ok(scored)
        })
    }
}

impl ChunkStore for MemoryStore {
    fn fetch<'a>(&'a self, chunk_id: &'a str) -> StoreFuture<'a, Chunk> {
        Box::pin(async move {
            self.chunks
                .read()
                .await
                .get(chunk_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(chunk_id.to_string()))
        })
    }

    fn scroll<'a>(
        &'a self,
        filter: Option<&'a PaperFilter>,
        limit: usize,
    ) -> StoreFuture<'a, Vec<Chunk>> {
        Box::pin(async move {
            let guard = self.chunks.read().await;
            let mut out: Vec<Chunk> = guard
                .values()
                .filter(|c| admits(filter, &c.paper_id))
                .cloned()
                .collect();
            // HashMap order is arbitrary; keep scroll deterministic.
            out.sort_by(|a, b| a.id.cmp(&b.id));
            out.truncate(limit);
            Ok(out)
        })
    }
}

/// Cosine similarity in `[-1, 1]`; zero vectors score 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        (dot / (na.sqrt() * nb.sqrt())).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PaperMeta;
    use chrono::Utc;

    fn chunk(id: &str, paper: &str, v: Vec<f32>) -> Chunk {
        Chunk {
            id: id.into(),
            paper_id: paper.into(),
            text: format!("text of {id}"),
            position: 0,
            embedding: v,
            meta: PaperMeta::default(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn search_orders_by_similarity_and_honours_filter() {
        let store = MemoryStore::with_chunks([
            chunk("a", "p1", vec![1.0, 0.0]),
            chunk("b", "p2", vec![0.7, 0.7]),
            chunk("c", "p2", vec![0.0, 1.0]),
        ]);

        let hits = store.search(&[1.0, 0.0], 10, None).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.0.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);

        let only_p2 = PaperFilter::new(["p2"]);
        let hits = store.search(&[1.0, 0.0], 1, Some(&only_p2)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "b");
    }

    #[tokio::test]
    async fn fetch_missing_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.fetch("nope").await,
            Err(StoreError::NotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn cosine_handles_zero_vectors() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
    }
}
