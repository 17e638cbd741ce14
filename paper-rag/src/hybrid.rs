//! Hybrid search: semantic recall over every query variant, fused with
//! keyword overlap into one ranked candidate list.
//!
//! When vector search is unreachable the stage degrades to keyword-only
//! ranking over a bounded scan of the chunk store instead of failing.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use paper_store::{Chunk, PaperFilter, admits};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::candidate::{Candidate, SubScores, assign_ranks};
use crate::cfg::RagConfig;
use crate::error::RagError;
use crate::keyword::{keyword_score, tokens};
use crate::query::Query;
use crate::retriever::SemanticRetriever;

#[derive(Debug, Default)]
pub struct HybridOutcome {
    /// At most `2 × top_k`, best first, ranks assigned.
    pub candidates: Vec<Candidate>,
    /// Semantic signal was unavailable; ranking is keyword-only.
    pub degraded: bool,
    pub degraded_reason: Option<String>,
    /// Ids returned by the index whose chunk could not be fetched.
    pub dropped_chunks: Vec<String>,
}

/// Effective fusion weights. A non-positive or non-finite sum falls back
/// to equal weighting; otherwise weights are normalized to sum to 1.
pub fn fuse_weights(semantic: f32, keyword: f32) -> (f32, f32) {
    let sum = semantic + keyword;
    if !sum.is_finite() || sum <= 0.0 {
        return (0.5, 0.5);
    }
    (semantic / sum, keyword / sum)
}

/// Composite descending, then newest chunk first, then id for determinism.
pub fn by_composite(a: &Candidate, b: &Candidate) -> Ordering {
    b.scores
        .composite
        .total_cmp(&a.scores.composite)
        .then_with(|| b.chunk.created_at.cmp(&a.chunk.created_at))
        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
}

pub async fn hybrid_search(
    retriever: &SemanticRetriever,
    query: &Query,
    filter: Option<&PaperFilter>,
    cfg: &RagConfig,
    cancel: &CancelToken,
) -> Result<HybridOutcome, RagError> {
    let limit = query.top_k().saturating_mul(2).max(1);

    let texts: Vec<&str> = query.search_texts().collect();
    let results = join_all(
        texts
            .iter()
            .map(|t| retriever.nearest(t, limit, filter, cfg, cancel)),
    )
    .await;

    let mut best: HashMap<String, f32> = HashMap::new();
    let mut failures = Vec::new();
    for (text, res) in texts.iter().zip(results) {
        match res {
            Ok(hits) => {
                for (id, sim) in hits {
                    let e = best.entry(id).or_insert(f32::NEG_INFINITY);
                    if sim > *e {
                        *e = sim;
                    }
                }
            }
            Err(RagError::Cancelled) => return Err(RagError::Cancelled),
            Err(e) => {
                warn!(target: "paper_rag::hybrid", variant = %text, error = %e, "variant retrieval failed");
                failures.push(e);
            }
        }
    }

    if failures.len() == texts.len() {
        let reason = failures
            .first()
            .map(ToString::to_string)
            .unwrap_or_else(|| "semantic search unavailable".into());
        return keyword_only(retriever, query, filter, cfg, reason).await;
    }
    debug!(target: "paper_rag::hybrid", variants = texts.len(), failed = failures.len(), merged = best.len(), "semantic recall merged");

    // Deterministic fetch order.
    let mut ids: Vec<String> = best.keys().cloned().collect();
    ids.sort();
    let fetched = match retriever.fetch_chunks(&ids, cfg).await {
        Ok(f) => f,
        Err(e) if e.is_transient() => {
            return keyword_only(retriever, query, filter, cfg, e.to_string()).await;
        }
        Err(e) => return Err(e),
    };

    let q_tokens = query.tokens();
    let (ws, wk) = fuse_weights(cfg.semantic_weight, cfg.keyword_weight);
    let mut candidates: Vec<Candidate> = fetched
        .chunks
        .into_iter()
        .filter(|c| admits(filter, &c.paper_id))
        .map(|chunk| {
            let semantic = best
                .get(&chunk.id)
                .copied()
                .unwrap_or(0.0)
                .clamp(0.0, 1.0);
            let keyword = keyword_score(&q_tokens, &chunk.text, cfg.keyword_jaccard_share);
            let fused = ws * semantic + wk * keyword;
            Candidate::new(
                chunk,
                SubScores {
                    semantic,
                    keyword,
                    fused,
                    composite: fused,
                    ..SubScores::default()
                },
            )
        })
        .collect();

    candidates.sort_by(by_composite);
    candidates.truncate(limit);
    assign_ranks(&mut candidates);

    Ok(HybridOutcome {
        candidates,
        degraded: false,
        degraded_reason: None,
        dropped_chunks: fetched.dropped,
    })
}

/// Keyword-only ranking over a bounded chunk scan. Each chunk keeps the best
/// keyword score across the normalized query and its variants; chunks with
/// no overlap are discarded.
async fn keyword_only(
    retriever: &SemanticRetriever,
    query: &Query,
    filter: Option<&PaperFilter>,
    cfg: &RagConfig,
    reason: String,
) -> Result<HybridOutcome, RagError> {
    warn!(target: "paper_rag::hybrid", %reason, "semantic search unavailable, degrading to keyword-only");
    let limit = query.top_k().saturating_mul(2).max(1);
    let chunks = retriever.scroll(filter, cfg.keyword_scan_limit, cfg).await?;

    let token_sets: Vec<HashSet<String>> = query.search_texts().map(tokens).collect();
    let mut candidates: Vec<Candidate> = chunks
        .into_iter()
        .filter(|c| admits(filter, &c.paper_id))
        .filter_map(|chunk| {
            let keyword = best_keyword(&token_sets, &chunk, cfg.keyword_jaccard_share);
            (keyword > 0.0).then(|| {
                Candidate::new(
                    chunk,
                    SubScores {
                        keyword,
                        fused: keyword,
                        composite: keyword,
                        ..SubScores::default()
                    },
                )
            })
        })
        .collect();

    candidates.sort_by(by_composite);
    candidates.truncate(limit);
    assign_ranks(&mut candidates);
    info!(target: "paper_rag::hybrid", kept = candidates.len(), "keyword-only candidates");

    Ok(HybridOutcome {
        candidates,
        degraded: true,
        degraded_reason: Some(reason),
        dropped_chunks: Vec::new(),
    })
}

fn best_keyword(token_sets: &[HashSet<String>], chunk: &Chunk, share: f32) -> f32 {
    token_sets
        .iter()
        .map(|q| keyword_score(q, &chunk.text, share))
        .fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_are_kept() {
        let (s, k) = fuse_weights(0.7, 0.3);
        assert!((s - 0.7).abs() < 1e-6);
        assert!((k - 0.3).abs() < 1e-6);
    }

    #[test]
    fn zero_weights_fall_back_to_equal() {
        assert_eq!(fuse_weights(0.0, 0.0), (0.5, 0.5));
        assert_eq!(fuse_weights(f32::INFINITY, 1.0), (0.5, 0.5));
    }

    #[test]
    fn weights_are_normalized() {
        let (s, k) = fuse_weights(2.0, 2.0);
        assert_eq!((s, k), (0.5, 0.5));
        assert_eq!(fuse_weights(1.0, 0.0), (1.0, 0.0));
    }
}
