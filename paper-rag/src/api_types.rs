//! Public request/response types of the pipeline.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::mode::AnswerMode;
use crate::relevance::RankedResult;

/// Hard upper bound on `top_k` accepted from callers.
pub const MAX_TOP_K: usize = 100;

/// One question put to the pipeline.
///
/// `top_k = 0` means: "use the mode's default".
///
/// # Example
/// ```
/// use paper_rag::{AnswerMode, AnswerRequest};
/// let req = AnswerRequest::new("what is self-attention", AnswerMode::Concise);
/// assert_eq!(req.top_k, 0);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
    pub mode: AnswerMode,
    #[serde(default)]
    pub top_k: usize,
    /// Restricts retrieval to these papers. Required (non-empty) for
    /// `MultiDocument`; an optional scope for every other mode.
    #[serde(default)]
    pub paper_ids: Option<BTreeSet<String>>,
}

impl AnswerRequest {
    pub fn new(question: impl Into<String>, mode: AnswerMode) -> Self {
        Self {
            question: question.into(),
            mode,
            top_k: 0,
            paper_ids: None,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn papers<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }
}

/// A source the answer draws on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub paper_id: String,
    pub title: String,
    pub chunk_index: usize,
    pub chunk_id: String,
    /// Normalized 0–100 relevance of the cited chunk.
    pub relevance: f32,
}

/// Quality caveats attached to a best-effort answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Caveat {
    /// Semantic search was unavailable; ranking used keyword overlap only.
    DegradedRetrieval { reason: String },
    /// Fewer sources than requested because one paper dominated the results.
    LimitedSourceDiversity { distinct_papers: usize, required: usize },
    /// The configured generator failed; the answer is an extract of the sources.
    GenerationFallback { reason: String },
    /// Some retrieved chunks disappeared before they could be read.
    DroppedChunks { count: usize },
}

/// Pipeline states. A successful query visits every state from `Received`
/// to `Logged` in order; any failure ends in `Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Received,
    Expanded,
    Retrieved,
    Reranked,
    Scored,
    Generated,
    Logged,
    Failed,
}

#[derive(Clone, Debug, Serialize)]
pub struct Diagnostics {
    pub elapsed_ms: u64,
    pub degraded: bool,
    pub degraded_reason: Option<String>,
    pub limited_diversity: bool,
    pub final_state: PipelineState,
    /// States visited, in order.
    pub trace: Vec<PipelineState>,
    pub expansions: Vec<String>,
    /// Candidates produced by hybrid search before rerank.
    pub candidate_count: usize,
    pub per_paper_cap: usize,
    /// Name of the generator that produced the answer.
    pub generator: String,
    pub dropped_chunks: Vec<String>,
}

/// Result of [`crate::RagPipeline::answer`].
#[derive(Clone, Debug, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub ranked: RankedResult,
    pub diagnostics: Diagnostics,
    pub caveats: Vec<Caveat>,
}

impl RagAnswer {
    /// Whether the answer came with any quality caveat.
    pub fn is_best_effort(&self) -> bool {
        !self.caveats.is_empty()
    }
}
