//! Secondary-signal rerank with a per-paper diversity cap.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::candidate::{Candidate, assign_ranks, distinct_papers};
use crate::keyword::title_match;
use crate::quality::quality_score;

const W_SEMANTIC: f32 = 0.5;
const W_KEYWORD: f32 = 0.3;
const W_TITLE: f32 = 0.2;

#[derive(Debug, Default)]
pub struct RerankOutcome {
    /// At most `top_k`, no paper above `per_paper_cap`.
    pub candidates: Vec<Candidate>,
    /// The cap rejected candidates and the list came up short of `top_k`.
    pub limited_diversity: bool,
    pub per_paper_cap: usize,
    pub distinct_papers: usize,
}

/// Most chunks any single paper may contribute: `max(1, top_k / divisor)`.
pub fn diversity_cap(top_k: usize, divisor: usize) -> usize {
    (top_k / divisor.max(1)).max(1)
}

/// `0.5 × semantic + 0.3 × keyword + 0.2 × title`.
pub fn secondary_composite(semantic: f32, keyword: f32, title: f32) -> f32 {
    W_SEMANTIC * semantic + W_KEYWORD * keyword + W_TITLE * title
}

fn by_secondary(a: &Candidate, b: &Candidate) -> Ordering {
    b.scores
        .composite
        .total_cmp(&a.scores.composite)
        .then_with(|| b.scores.quality.total_cmp(&a.scores.quality))
        .then_with(|| b.chunk.created_at.cmp(&a.chunk.created_at))
        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
}

/// Rescores, reorders and walks the list accepting candidates while their
/// paper is under the cap. Never pads: the result may be shorter than `top_k`.
pub fn rerank(
    mut candidates: Vec<Candidate>,
    query_tokens: &HashSet<String>,
    top_k: usize,
    divisor: usize,
    current_year: i32,
) -> RerankOutcome {
    for c in candidates.iter_mut() {
        let s = &mut c.scores;
        s.title = title_match(query_tokens, &c.chunk.meta.title);
        s.quality = quality_score(&c.chunk.meta, current_year);
        s.composite = secondary_composite(s.semantic, s.keyword, s.title);
    }
    candidates.sort_by(by_secondary);

    let cap = diversity_cap(top_k, divisor);
    let mut per_paper: HashMap<String, usize> = HashMap::new();
    let mut accepted = Vec::with_capacity(top_k.min(candidates.len()));
    let mut rejected = 0usize;

    for c in candidates {
        if accepted.len() >= top_k {
            break;
        }
        let n = per_paper.entry(c.chunk.paper_id.clone()).or_insert(0);
        if *n >= cap {
            rejected += 1;
            continue;
        }
        *n += 1;
        accepted.push(c);
    }

    assign_ranks(&mut accepted);
    let limited_diversity = rejected > 0 && accepted.len() < top_k;
    debug!(
        target: "paper_rag::rerank",
        kept = accepted.len(),
        rejected,
        cap,
        limited_diversity,
        "rerank done"
    );

    RerankOutcome {
        distinct_papers: distinct_papers(&accepted),
        candidates: accepted,
        limited_diversity,
        per_paper_cap: cap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::SubScores;
    use chrono::{TimeZone, Utc};
    use paper_store::{Chunk, PaperMeta};

    fn cand(id: &str, paper: &str, semantic: f32) -> Candidate {
        Candidate::new(
            Chunk {
                id: id.into(),
                paper_id: paper.into(),
                text: String::new(),
                position: 0,
                embedding: Vec::new(),
                meta: PaperMeta::default(),
                created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            },
            SubScores {
                semantic,
                ..SubScores::default()
            },
        )
    }

    #[test]
    fn cap_formula() {
        assert_eq!(diversity_cap(3, 3), 1);
        assert_eq!(diversity_cap(2, 3), 1);
        assert_eq!(diversity_cap(9, 3), 3);
        assert_eq!(diversity_cap(10, 4), 2);
        assert_eq!(diversity_cap(5, 0), 5);
    }

    #[test]
    fn single_paper_is_capped_and_flagged() {
        let cands = (0..5).map(|i| cand(&format!("a{i}"), "A", 0.9)).collect();
        let out = rerank(cands, &HashSet::new(), 6, 3, 2025);
        assert_eq!(out.per_paper_cap, 2);
        assert_eq!(out.candidates.len(), 2);
        assert!(out.limited_diversity);
        assert_eq!(out.distinct_papers, 1);
    }

    #[test]
    fn diverse_list_fills_top_k_without_flag() {
        let cands = vec![
            cand("a1", "A", 0.9),
            cand("a2", "A", 0.8),
            cand("b1", "B", 0.7),
            cand("c1", "C", 0.6),
        ];
        let out = rerank(cands, &HashSet::new(), 3, 3, 2025);
        let ids: Vec<_> = out.candidates.iter().map(|c| c.id().to_string()).collect();
        assert_eq!(ids, vec!["a1", "b1", "c1"]);
        assert!(!out.limited_diversity);
        assert_eq!(out.candidates[2].rank, 3);
    }

    #[test]
    fn title_match_lifts_candidates() {
        let mut a = cand("a1", "A", 0.5);
        a.chunk.meta.title = "Graph Transformers".into();
        let b = cand("b1", "B", 0.55);
        let q = crate::keyword::tokens("graph transformers");
        let out = rerank(vec![b, a], &q, 2, 1, 2025);
        assert_eq!(out.candidates[0].id(), "a1");
        assert!((out.candidates[0].scores.title - 1.0).abs() < 1e-6);
    }
}
