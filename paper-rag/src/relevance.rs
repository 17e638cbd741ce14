//! Relevance normalization onto a 0–100 scale with quality bands.

use std::fmt;

use serde::Serialize;

use crate::candidate::Candidate;

/// Discrete quality band. Thresholds partition `[0, 100]` with no gaps:
/// a score belongs to the highest band whose lower bound it reaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceBand {
    Poor,
    Weak,
    Moderate,
    Good,
    Excellent,
}

impl RelevanceBand {
    pub fn from_score(score: f32) -> Self {
        if score >= 80.0 {
            RelevanceBand::Excellent
        } else if score >= 60.0 {
            RelevanceBand::Good
        } else if score >= 40.0 {
            RelevanceBand::Moderate
        } else if score >= 20.0 {
            RelevanceBand::Weak
        } else {
            RelevanceBand::Poor
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RelevanceBand::Excellent => "Excellent",
            RelevanceBand::Good => "Good",
            RelevanceBand::Moderate => "Moderate",
            RelevanceBand::Weak => "Weak",
            RelevanceBand::Poor => "Poor",
        }
    }
}

impl fmt::Display for RelevanceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Relevance {
    pub score: f32,
    pub band: RelevanceBand,
}

impl Relevance {
    pub fn new(score: f32) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            score,
            band: RelevanceBand::from_score(score),
        }
    }
}

/// Final ordered sources for one query, annotated with relevance.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RankedResult {
    pub candidates: Vec<Candidate>,
    /// Mean of the per-candidate scores; 0 when empty.
    pub relevance: f32,
    pub band: Option<RelevanceBand>,
}

impl RankedResult {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn paper_ids(&self) -> Vec<String> {
        let mut seen = Vec::<String>::new();
        for c in &self.candidates {
            if !seen.iter().any(|p| p == c.paper_id()) {
                seen.push(c.paper_id().to_string());
            }
        }
        seen
    }
}

/// Linear min-max rescale of raw scores to `[0, 100]`.
///
/// When every raw score is (nearly) equal there is no spread to rescale;
/// each value is then read as an absolute `[0, 1]` score. Non-finite inputs
/// count as 0.
pub fn rescale(raw: &[f32]) -> Vec<f32> {
    let clean: Vec<f32> = raw
        .iter()
        .map(|v| if v.is_finite() { *v } else { 0.0 })
        .collect();
    let Some(min) = clean.iter().copied().reduce(f32::min) else {
        return Vec::new();
    };
    let max = clean.iter().copied().fold(min, f32::max);
    let range = max - min;

    if range <= f32::EPSILON {
        return clean.iter().map(|v| v.clamp(0.0, 1.0) * 100.0).collect();
    }
    clean
        .iter()
        .map(|v| ((v - min) / range * 100.0).clamp(0.0, 100.0))
        .collect()
}

/// Annotates candidates with their normalized relevance and wraps them.
pub fn score_ranked(mut candidates: Vec<Candidate>) -> RankedResult {
    let raw: Vec<f32> = candidates.iter().map(|c| c.scores.composite).collect();
    let scaled = rescale(&raw);
    for (c, s) in candidates.iter_mut().zip(scaled.iter()) {
        c.relevance = Some(Relevance::new(*s));
    }

    if scaled.is_empty() {
        return RankedResult::default();
    }
    let mean = Relevance::new(scaled.iter().sum::<f32>() / scaled.len() as f32);
    RankedResult {
        candidates,
        relevance: mean.score,
        band: Some(mean.band),
    }
}
