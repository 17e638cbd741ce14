//! Similarity-search and chunk-lookup contracts.

use crate::embed::StoreFuture;
use crate::record::{Chunk, PaperFilter};

/// Nearest-neighbour search over chunk vectors.
pub trait SemanticIndex: Send + Sync {
    /// Returns up to `limit` `(chunk_id, cosine similarity)` pairs ordered by
    /// similarity descending. Similarity lies in `[-1, 1]`.
    fn search<'a>(
        &'a self,
        vector: &'a [f32],
        limit: usize,
        filter: Option<&'a PaperFilter>,
    ) -> StoreFuture<'a, Vec<(String, f32)>>;
}

/// Read access to stored chunks.
pub trait ChunkStore: Send + Sync {
    /// Fails with `StoreError::NotFound` when the chunk is gone.
    fn fetch<'a>(&'a self, chunk_id: &'a str) -> StoreFuture<'a, Chunk>;

    /// Lists up to `limit` chunks, optionally restricted to a paper set.
    /// Used as the lexical recall source when vector search is unavailable.
    fn scroll<'a>(&'a self, filter: Option<&'a PaperFilter>, limit: usize)
    -> StoreFuture<'a, Vec<Chunk>>;
}
