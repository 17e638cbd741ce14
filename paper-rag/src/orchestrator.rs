//! Query pipeline: expand → retrieve → rerank → score → generate → log.
//!
//! Every query works against one configuration snapshot taken when it
//! starts. Retrieval failures degrade; generation failures end the query
//! in `Failed` but keep the ranked sources; log failures only warn.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, Utc};
use paper_store::{ChunkStore, EmbeddingsProvider, PaperFilter, SemanticIndex};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::api_types::{
    AnswerRequest, Caveat, Diagnostics, MAX_TOP_K, PipelineState, RagAnswer,
};
use crate::cancel::CancelToken;
use crate::candidate::Candidate;
use crate::cfg::RagConfig;
use crate::error::RagError;
use crate::generator::{
    AnswerGenerator, ExtractiveGenerator, GeneratedAnswer, GenerationRequest,
};
use crate::hybrid::{HybridOutcome, hybrid_search};
use crate::mode::{AnswerMode, ContextScope};
use crate::query::Query;
use crate::query_log::{QueryLogEntry, QueryLogSink};
use crate::relevance::{RankedResult, score_ranked};
use crate::rerank::rerank;
use crate::retriever::{EmbedCache, SearchCache, SemanticRetriever};

/// External capabilities the pipeline is wired with.
pub struct Collaborators {
    pub embedder: Arc<dyn EmbeddingsProvider>,
    pub index: Arc<dyn SemanticIndex>,
    pub store: Arc<dyn ChunkStore>,
    pub generator: Arc<dyn AnswerGenerator>,
    pub log: Arc<dyn QueryLogSink>,
}

pub struct RagPipeline {
    config: RwLock<Arc<RagConfig>>,
    retriever: SemanticRetriever,
    generator: Arc<dyn AnswerGenerator>,
    fallback: ExtractiveGenerator,
    log: Arc<dyn QueryLogSink>,
}

impl RagPipeline {
    /// Pipeline with in-memory TTL caches.
    pub fn new(config: RagConfig, c: Collaborators) -> Result<Self, RagError> {
        config.validate()?;
        let retriever = SemanticRetriever::new(c.embedder, c.index, c.store);
        Ok(Self::assemble(config, retriever, c.generator, c.log))
    }

    /// Pipeline with caller-provided caches (e.g. shared across pipelines).
    pub fn with_caches(
        config: RagConfig,
        c: Collaborators,
        embed_cache: EmbedCache,
        search_cache: SearchCache,
    ) -> Result<Self, RagError> {
        config.validate()?;
        let retriever =
            SemanticRetriever::with_caches(c.embedder, c.index, c.store, embed_cache, search_cache);
        Ok(Self::assemble(config, retriever, c.generator, c.log))
    }

    fn assemble(
        config: RagConfig,
        retriever: SemanticRetriever,
        generator: Arc<dyn AnswerGenerator>,
        log: Arc<dyn QueryLogSink>,
    ) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            retriever,
            generator,
            fallback: ExtractiveGenerator::default(),
            log,
        }
    }

    /// Replaces the configuration for queries started from now on.
    pub async fn update_config(&self, config: RagConfig) -> Result<(), RagError> {
        config.validate()?;
        *self.config.write().await = Arc::new(config);
        info!("rag config updated");
        Ok(())
    }

    pub async fn config_snapshot(&self) -> Arc<RagConfig> {
        self.config.read().await.clone()
    }

    pub async fn answer(&self, req: AnswerRequest) -> Result<RagAnswer, RagError> {
        self.answer_with_cancel(req, &CancelToken::new()).await
    }

    /// Runs one query.
    ///
    /// # Errors
    /// - `InvalidQuery` for malformed input (nothing is retrieved or logged)
    /// - `NoRelevantContext` when retrieval finds nothing
    /// - `GenerationFailed` when generation fails and the extractive fallback is off
    /// - `Cancelled` once `cancel` fires; nothing is cached or logged afterwards
    /// - retrieval errors that could not be degraded around
    #[instrument(skip_all, fields(mode = %req.mode, top_k = req.top_k))]
    pub async fn answer_with_cancel(
        &self,
        req: AnswerRequest,
        cancel: &CancelToken,
    ) -> Result<RagAnswer, RagError> {
        let started = Instant::now();
        let cfg = self.config_snapshot().await;
        let mut run = Run::new(req.mode, req.question.trim(), started);

        let top_k = resolve_top_k(&req)?;
        let filter = resolve_filter(&req)?;
        let query = Query::new(&req.question, req.mode, top_k, cfg.max_expansions)?;
        run.advance(PipelineState::Expanded);
        debug!(normalized = query.normalized(), variants = ?query.variants(), "query expanded");

        let hybrid = match hybrid_search(&self.retriever, &query, filter.as_ref(), &cfg, cancel).await
        {
            Ok(h) => h,
            Err(RagError::Cancelled) => return Err(RagError::Cancelled),
            Err(e) => return Err(self.fail(run, e, &cfg, cancel).await),
        };
        run.advance(PipelineState::Retrieved);
        info!(
            candidates = hybrid.candidates.len(),
            degraded = hybrid.degraded,
            "retrieval done"
        );
        if hybrid.candidates.is_empty() {
            run.degraded = hybrid.degraded;
            return Err(self.fail(run, RagError::NoRelevantContext, &cfg, cancel).await);
        }
        cancel.check()?;

        let HybridOutcome {
            candidates,
            degraded,
            degraded_reason,
            dropped_chunks,
        } = hybrid;
        let candidate_count = candidates.len();
        let reranked = rerank(
            candidates,
            &query.tokens(),
            top_k,
            req.mode.diversity_divisor(&cfg),
            Utc::now().year(),
        );
        run.advance(PipelineState::Reranked);

        let ranked = score_ranked(reranked.candidates);
        run.advance(PipelineState::Scored);

        let mut caveats = Vec::new();
        if let Some(reason) = &degraded_reason {
            caveats.push(Caveat::DegradedRetrieval {
                reason: reason.clone(),
            });
        }
        if reranked.limited_diversity {
            caveats.push(Caveat::LimitedSourceDiversity {
                distinct_papers: reranked.distinct_papers,
                required: req.mode.min_distinct_papers(),
            });
        }
        if !dropped_chunks.is_empty() {
            caveats.push(Caveat::DroppedChunks {
                count: dropped_chunks.len(),
            });
        }

        let context = generation_context(req.mode, &ranked);
        let gen_req = GenerationRequest {
            mode: req.mode,
            question: query.raw(),
            context: &context,
            max_ctx_chars: cfg.max_ctx_chars,
        };
        let generated = self
            .generate(gen_req, reranked.distinct_papers, &cfg)
            .await;
        cancel.check()?;

        run.degraded = degraded;
        let mut diagnostics = Diagnostics {
            elapsed_ms: 0,
            degraded,
            degraded_reason,
            limited_diversity: reranked.limited_diversity,
            final_state: PipelineState::Failed,
            trace: Vec::new(),
            expansions: query.variants().to_vec(),
            candidate_count,
            per_paper_cap: reranked.per_paper_cap,
            generator: String::new(),
            dropped_chunks,
        };

        let (answer, generator) = match generated {
            Ok(a) => {
                run.advance(PipelineState::Generated);
                (a, self.generator.name())
            }
            Err(reason) if cfg.extractive_fallback => {
                warn!(%reason, "generation failed, answering extractively");
                let a = self.fallback.extract(gen_req).map_err(|e| RagError::GenerationFailed {
                    reason: format!("{reason}; fallback: {e}"),
                    partial: Box::new(ranked.clone()),
                })?;
                run.failure = Some(reason.clone());
                run.advance(PipelineState::Failed);
                caveats.push(Caveat::GenerationFallback { reason });
                (a, self.fallback.name())
            }
            Err(reason) => {
                run.chunks = ranked.len();
                run.papers = ranked.paper_ids();
                let err = RagError::GenerationFailed {
                    reason,
                    partial: Box::new(ranked),
                };
                return Err(self.fail(run, err, &cfg, cancel).await);
            }
        };

        run.answer = answer.text.clone();
        run.generator = generator;
        run.chunks = ranked.len();
        run.papers = ranked.paper_ids();
        let entry = run.entry();
        self.record(&entry, &cfg, cancel).await?;
        if run.state() != PipelineState::Failed {
            run.advance(PipelineState::Logged);
        }

        diagnostics.elapsed_ms = run.elapsed_ms();
        diagnostics.final_state = run.state();
        diagnostics.trace = run.trace;
        diagnostics.generator = generator.to_string();
        info!(
            elapsed_ms = diagnostics.elapsed_ms,
            state = ?diagnostics.final_state,
            sources = ranked.len(),
            "query answered"
        );

        Ok(RagAnswer {
            answer: answer.text,
            citations: answer.citations,
            ranked,
            diagnostics,
            caveats,
        })
    }

    /// Runs the configured generator under the generation timeout. Multi-paper
    /// modes refuse to generate from a single paper.
    async fn generate(
        &self,
        req: GenerationRequest<'_>,
        distinct_papers: usize,
        cfg: &RagConfig,
    ) -> Result<GeneratedAnswer, String> {
        let need = req.mode.min_distinct_papers();
        if distinct_papers < need {
            return Err(format!(
                "{} mode needs context from at least {need} distinct papers, found {distinct_papers}",
                req.mode
            ));
        }
        match tokio::time::timeout(cfg.generation_timeout, self.generator.generate(req)).await {
            Ok(Ok(a)) => Ok(a),
            Ok(Err(e)) => Err(e.reason),
            Err(_) => Err(format!(
                "generation timed out after {:?}",
                cfg.generation_timeout
            )),
        }
    }

    /// Logs a failed query and hands the error back.
    async fn fail(
        &self,
        mut run: Run,
        err: RagError,
        cfg: &RagConfig,
        cancel: &CancelToken,
    ) -> RagError {
        warn!(error = %err, "query failed");
        run.failure = Some(err.to_string());
        run.advance(PipelineState::Failed);
        match self.record(&run.entry(), cfg, cancel).await {
            Ok(()) => err,
            Err(cancelled) => cancelled,
        }
    }

    /// Appends to the query log unless the query was cancelled. A sink that
    /// errors or outlives the external timeout is only warned about.
    async fn record(
        &self,
        entry: &QueryLogEntry,
        cfg: &RagConfig,
        cancel: &CancelToken,
    ) -> Result<(), RagError> {
        cancel.check()?;
        match tokio::time::timeout(cfg.external_timeout, self.log.append(entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "query log append failed"),
            Err(_) => warn!(
                after = ?cfg.external_timeout,
                "query log append timed out, entry dropped"
            ),
        }
        Ok(())
    }
}

fn resolve_top_k(req: &AnswerRequest) -> Result<usize, RagError> {
    match req.top_k {
        0 => Ok(req.mode.default_top_k()),
        k if k > MAX_TOP_K => Err(RagError::InvalidQuery(format!(
            "top_k must be at most {MAX_TOP_K}, got {k}"
        ))),
        k => Ok(k),
    }
}

/// Multi-document mode requires an explicit, non-empty paper set. Other
/// modes treat a non-empty set as an optional scope.
fn resolve_filter(req: &AnswerRequest) -> Result<Option<PaperFilter>, RagError> {
    let ids = req.paper_ids.as_ref().filter(|ids| !ids.is_empty());
    match (req.mode, ids) {
        (AnswerMode::MultiDocument, None) => Err(RagError::InvalidQuery(
            "multi_document mode needs at least one paper id".into(),
        )),
        (_, Some(ids)) => Ok(Some(PaperFilter {
            paper_ids: ids.clone(),
        })),
        (_, None) => Ok(None),
    }
}

/// Chunks handed to the generator: the best paper only, or everything.
fn generation_context(mode: AnswerMode, ranked: &RankedResult) -> Vec<Candidate> {
    match mode.context_scope() {
        ContextScope::AllPapers => ranked.candidates.clone(),
        ContextScope::BestPaper => {
            let Some(best) = ranked.candidates.first() else {
                return Vec::new();
            };
            ranked
                .candidates
                .iter()
                .filter(|c| c.paper_id() == best.paper_id())
                .cloned()
                .collect()
        }
    }
}

/// Book-keeping for one query: visited states and the log entry fields.
struct Run {
    mode: AnswerMode,
    question: String,
    started: Instant,
    trace: Vec<PipelineState>,
    answer: String,
    papers: Vec<String>,
    chunks: usize,
    generator: &'static str,
    degraded: bool,
    failure: Option<String>,
}

impl Run {
    fn new(mode: AnswerMode, question: &str, started: Instant) -> Self {
        Self {
            mode,
            question: question.to_string(),
            started,
            trace: vec![PipelineState::Received],
            answer: String::new(),
            papers: Vec::new(),
            chunks: 0,
            generator: "none",
            degraded: false,
            failure: None,
        }
    }

    fn advance(&mut self, state: PipelineState) {
        debug!(?state, "pipeline state");
        self.trace.push(state);
    }

    fn state(&self) -> PipelineState {
        self.trace
            .last()
            .copied()
            .unwrap_or(PipelineState::Received)
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn entry(&self) -> QueryLogEntry {
        // A successful query is logged as having reached `Logged`.
        let final_state = match self.state() {
            PipelineState::Failed => PipelineState::Failed,
            _ => PipelineState::Logged,
        };
        QueryLogEntry {
            query: self.question.clone(),
            answer: self.answer.clone(),
            paper_ids: self.papers.clone(),
            chunk_count: self.chunks,
            mode: self.mode,
            generator: self.generator.to_string(),
            elapsed_ms: self.elapsed_ms(),
            created_at: Utc::now(),
            final_state,
            degraded: self.degraded,
            failure: self.failure.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn zero_top_k_uses_mode_default() {
        let req = AnswerRequest::new("q", AnswerMode::Survey);
        assert_eq!(resolve_top_k(&req).unwrap(), 15);
        assert!(resolve_top_k(&req.clone().top_k(101)).is_err());
        assert_eq!(resolve_top_k(&req.top_k(7)).unwrap(), 7);
    }

    #[test]
    fn multi_document_requires_papers() {
        let req = AnswerRequest::new("q", AnswerMode::MultiDocument);
        assert!(matches!(resolve_filter(&req), Err(RagError::InvalidQuery(_))));

        let empty = AnswerRequest {
            paper_ids: Some(BTreeSet::new()),
            ..req.clone()
        };
        assert!(matches!(resolve_filter(&empty), Err(RagError::InvalidQuery(_))));

        let scoped = req.papers(["p1", "p2"]);
        assert_eq!(resolve_filter(&scoped).unwrap().unwrap().paper_ids.len(), 2);
    }

    #[test]
    fn other_modes_scope_optionally() {
        let req = AnswerRequest::new("q", AnswerMode::Concise);
        assert!(resolve_filter(&req).unwrap().is_none());
        let empty = AnswerRequest {
            paper_ids: Some(BTreeSet::new()),
            ..req
        };
        assert!(resolve_filter(&empty).unwrap().is_none());
    }
}
