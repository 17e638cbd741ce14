//! Per-query working set: a chunk plus its named sub-scores.

use paper_store::Chunk;
use serde::Serialize;

use crate::relevance::Relevance;

/// Named sub-scores. Every signal except `quality` lies in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SubScores {
    /// Best cosine similarity seen across query variants, clamped to `[0, 1]`.
    pub semantic: f32,
    pub keyword: f32,
    /// Hybrid-search fusion of semantic and keyword.
    pub fused: f32,
    /// Fraction of query tokens found in the paper title.
    pub title: f32,
    /// Score the list is currently ordered by (fused after search, the
    /// secondary composite after rerank).
    pub composite: f32,
    pub quality: f32,
}

/// A retrieved chunk being ranked for one query. Never persisted.
#[derive(Clone, Debug, Serialize)]
pub struct Candidate {
    pub chunk: Chunk,
    pub scores: SubScores,
    /// 1-based position in the current ordering.
    pub rank: usize,
    /// Normalized 0–100 relevance, filled in by the scorer.
    pub relevance: Option<Relevance>,
}

impl Candidate {
    pub fn new(chunk: Chunk, scores: SubScores) -> Self {
        Self {
            chunk,
            scores,
            rank: 0,
            relevance: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.chunk.id
    }

    pub fn paper_id(&self) -> &str {
        &self.chunk.paper_id
    }
}

/// Re-numbers ranks `1..=n` in current order.
pub fn assign_ranks(cands: &mut [Candidate]) {
    for (i, c) in cands.iter_mut().enumerate() {
        c.rank = i + 1;
    }
}

/// Number of distinct papers among `cands`.
pub fn distinct_papers(cands: &[Candidate]) -> usize {
    let mut ids: Vec<&str> = cands.iter().map(Candidate::paper_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.len()
}
