//! End-to-end pipeline behavior against in-memory collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use paper_rag::keyword::tokens;
use paper_rag::{
    AnswerGenerator, AnswerMode, AnswerRequest, CancelToken, Caveat, Collaborators,
    ExtractiveGenerator, GenFuture, GeneratedAnswer, GenerationError, GenerationRequest,
    LogFuture, MemoryQueryLog, PipelineState, QueryLogEntry, QueryLogSink, RagConfig, RagError,
    RagPipeline, citations_for,
};
use paper_store::{
    Chunk, ChunkStore, EmbeddingsProvider, MemoryStore, PaperFilter, PaperMeta, SemanticIndex,
    StoreError, StoreFuture,
};

const DIM: usize = 256;

fn bucket(tok: &str) -> usize {
    let mut h: u32 = 0x811c_9dc5;
    for b in tok.bytes() {
        h ^= u32::from(b);
        h = h.wrapping_mul(0x0100_0193);
    }
    h as usize % DIM
}

/// Deterministic bag-of-words vector.
fn bow(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    for t in tokens(text) {
        v[bucket(&t)] += 1.0;
    }
    v
}

#[derive(Default)]
struct BowEmbedder {
    calls: AtomicUsize,
}

impl EmbeddingsProvider for BowEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> StoreFuture<'a, Vec<f32>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(bow(text))
        })
    }
}

struct DownEmbedder;

impl EmbeddingsProvider for DownEmbedder {
    fn embed<'a>(&'a self, _text: &'a str) -> StoreFuture<'a, Vec<f32>> {
        Box::pin(async { Err(StoreError::EmbeddingUnavailable("connection refused".into())) })
    }
}

/// Counts calls before delegating to a memory store.
struct Counting {
    inner: MemoryStore,
    searches: AtomicUsize,
    fetches: AtomicUsize,
}

impl Counting {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            searches: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }
}

impl SemanticIndex for Counting {
    fn search<'a>(
        &'a self,
        vector: &'a [f32],
        limit: usize,
        filter: Option<&'a PaperFilter>,
    ) -> StoreFuture<'a, Vec<(String, f32)>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(vector, limit, filter)
    }
}

impl ChunkStore for Counting {
    fn fetch<'a>(&'a self, chunk_id: &'a str) -> StoreFuture<'a, Chunk> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(chunk_id)
    }

    fn scroll<'a>(
        &'a self,
        filter: Option<&'a PaperFilter>,
        limit: usize,
    ) -> StoreFuture<'a, Vec<Chunk>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.scroll(filter, limit)
    }
}

struct DownIndex;

impl SemanticIndex for DownIndex {
    fn search<'a>(
        &'a self,
        _vector: &'a [f32],
        _limit: usize,
        _filter: Option<&'a PaperFilter>,
    ) -> StoreFuture<'a, Vec<(String, f32)>> {
        Box::pin(async { Err(StoreError::IndexUnavailable("qdrant unreachable".into())) })
    }
}

/// Never answers within any sane timeout.
struct HangingIndex;

impl SemanticIndex for HangingIndex {
    fn search<'a>(
        &'a self,
        _vector: &'a [f32],
        _limit: usize,
        _filter: Option<&'a PaperFilter>,
    ) -> StoreFuture<'a, Vec<(String, f32)>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        })
    }
}

/// A sink whose writes never complete.
struct StalledLog;

impl QueryLogSink for StalledLog {
    fn append<'a>(&'a self, _entry: &'a QueryLogEntry) -> LogFuture<'a> {
        Box::pin(std::future::pending())
    }
}

struct FailingGenerator;

impl AnswerGenerator for FailingGenerator {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn generate<'a>(&'a self, _req: GenerationRequest<'a>) -> GenFuture<'a> {
        Box::pin(async { Err(GenerationError::new("model overloaded")) })
    }
}

struct SlowGenerator;

impl AnswerGenerator for SlowGenerator {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn generate<'a>(&'a self, _req: GenerationRequest<'a>) -> GenFuture<'a> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(GeneratedAnswer::default())
        })
    }
}

/// Simulates a caller walking away while the model is answering.
struct AbandoningGenerator {
    token: CancelToken,
}

impl AnswerGenerator for AbandoningGenerator {
    fn name(&self) -> &'static str {
        "abandoning"
    }

    fn generate<'a>(&'a self, req: GenerationRequest<'a>) -> GenFuture<'a> {
        Box::pin(async move {
            self.token.cancel();
            Ok(GeneratedAnswer {
                text: "never seen".into(),
                citations: citations_for(req.context),
            })
        })
    }
}

fn chunk(id: &str, paper: &str, title: &str, text: &str, day: u32) -> Chunk {
    Chunk {
        id: id.into(),
        paper_id: paper.into(),
        text: text.into(),
        position: 0,
        embedding: bow(text),
        meta: PaperMeta {
            title: title.into(),
            authors: vec!["A. Author".into(), "B. Author".into()],
            year: Some(2021),
            source: "arxiv".into(),
            ..PaperMeta::default()
        },
        created_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
    }
}

/// Paper A has five attention chunks, paper B one.
fn attention_corpus() -> Vec<Chunk> {
    let mut v: Vec<Chunk> = (0..5)
        .map(|i| {
            chunk(
                &format!("a{i}"),
                "A",
                "Attention Is All You Need",
                &format!("The attention mechanism computes weighted sums, variant {i}."),
                i + 1,
            )
        })
        .collect();
    v.push(chunk(
        "b0",
        "B",
        "Neural Machine Translation by Jointly Learning to Align",
        "An additive attention mechanism aligns source and target words.",
        10,
    ));
    v.push(chunk(
        "c0",
        "C",
        "Protein Structure Prediction",
        "Folding proteins with evolutionary couplings.",
        11,
    ));
    v
}

fn test_config() -> RagConfig {
    RagConfig {
        retry_backoff: Duration::from_millis(1),
        external_timeout: Duration::from_secs(5),
        ..RagConfig::default()
    }
}

struct Harness {
    pipeline: RagPipeline,
    embedder: Arc<BowEmbedder>,
    store: Arc<Counting>,
    log: Arc<MemoryQueryLog>,
}

fn harness_with(
    cfg: RagConfig,
    chunks: Vec<Chunk>,
    generator: Arc<dyn AnswerGenerator>,
) -> Harness {
    let embedder = Arc::new(BowEmbedder::default());
    let store = Arc::new(Counting::new(MemoryStore::with_chunks(chunks)));
    let log = Arc::new(MemoryQueryLog::new());
    let pipeline = RagPipeline::new(
        cfg,
        Collaborators {
            embedder: embedder.clone(),
            index: store.clone(),
            store: store.clone(),
            generator,
            log: log.clone(),
        },
    )
    .unwrap();
    Harness {
        pipeline,
        embedder,
        store,
        log,
    }
}

fn harness(chunks: Vec<Chunk>) -> Harness {
    harness_with(
        test_config(),
        chunks,
        Arc::new(ExtractiveGenerator::default()),
    )
}

fn papers_of(ans: &paper_rag::RagAnswer) -> Vec<&str> {
    ans.ranked.candidates.iter().map(|c| c.paper_id()).collect()
}

#[tokio::test]
async fn diversity_cap_limits_dominant_paper() {
    let h = harness(attention_corpus());
    let ans = h
        .pipeline
        .answer(AnswerRequest::new("attention mechanism", AnswerMode::Concise).top_k(3))
        .await
        .unwrap();

    let papers = papers_of(&ans);
    assert!(papers.len() <= 3);
    assert_eq!(papers.iter().filter(|p| **p == "A").count(), 1);
    assert!(papers.iter().filter(|p| **p == "B").count() <= 1);
    assert_eq!(ans.diagnostics.per_paper_cap, 1);
    assert!(!ans.diagnostics.degraded);
    assert_eq!(
        ans.diagnostics.trace,
        vec![
            PipelineState::Received,
            PipelineState::Expanded,
            PipelineState::Retrieved,
            PipelineState::Reranked,
            PipelineState::Scored,
            PipelineState::Generated,
            PipelineState::Logged,
        ]
    );
    assert_eq!(ans.diagnostics.final_state, PipelineState::Logged);

    for c in &ans.ranked.candidates {
        let r = c.relevance.unwrap();
        assert!((0.0..=100.0).contains(&r.score));
    }
    let log = h.log.entries().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].query, "attention mechanism");
}

#[tokio::test]
async fn embedding_outage_degrades_to_keyword_only() {
    let store = Arc::new(MemoryStore::with_chunks(attention_corpus()));
    let log = Arc::new(MemoryQueryLog::new());
    let pipeline = RagPipeline::new(
        test_config(),
        Collaborators {
            embedder: Arc::new(DownEmbedder),
            index: store.clone(),
            store,
            generator: Arc::new(ExtractiveGenerator::default()),
            log: log.clone(),
        },
    )
    .unwrap();

    let ans = pipeline
        .answer(AnswerRequest::new("attention mechanism", AnswerMode::Detailed).top_k(6))
        .await
        .unwrap();

    assert!(ans.diagnostics.degraded);
    assert!(ans.diagnostics.trace.contains(&PipelineState::Generated));
    assert!(!ans.ranked.is_empty());
    assert!(papers_of(&ans).iter().all(|p| *p != "C"));
    for c in &ans.ranked.candidates {
        assert_eq!(c.scores.semantic, 0.0);
        assert!(c.scores.keyword > 0.0);
    }
    assert!(
        ans.caveats
            .iter()
            .any(|c| matches!(c, Caveat::DegradedRetrieval { .. }))
    );
    assert!(log.entries().await[0].degraded);
}

#[tokio::test]
async fn compare_with_single_paper_returns_caveat() {
    let only_a: Vec<Chunk> = attention_corpus()
        .into_iter()
        .filter(|c| c.paper_id == "A")
        .collect();
    let h = harness(only_a);

    let ans = h
        .pipeline
        .answer(AnswerRequest::new("attention mechanism", AnswerMode::Compare))
        .await
        .unwrap();

    assert_eq!(ans.diagnostics.final_state, PipelineState::Failed);
    assert_eq!(ans.diagnostics.generator, "extractive");
    assert!(
        ans.caveats
            .iter()
            .any(|c| matches!(c, Caveat::GenerationFallback { .. }))
    );
    assert!(!ans.answer.is_empty());

    let log = h.log.entries().await;
    assert_eq!(log[0].final_state, PipelineState::Failed);
    assert!(log[0].failure.as_deref().unwrap().contains("distinct papers"));
}

#[tokio::test]
async fn compare_with_single_paper_is_typed_failure_without_fallback() {
    let only_a: Vec<Chunk> = attention_corpus()
        .into_iter()
        .filter(|c| c.paper_id == "A")
        .collect();
    let cfg = RagConfig {
        extractive_fallback: false,
        ..test_config()
    };
    let h = harness_with(cfg, only_a, Arc::new(ExtractiveGenerator::default()));

    let err = h
        .pipeline
        .answer(AnswerRequest::new("attention mechanism", AnswerMode::Compare))
        .await
        .unwrap_err();

    match err {
        RagError::GenerationFailed { partial, .. } => {
            assert!(!partial.is_empty());
            assert!(partial.candidates.iter().all(|c| c.paper_id() == "A"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.log.entries().await.len(), 1);
}

#[tokio::test]
async fn empty_multi_document_set_fails_before_retrieval() {
    let h = harness(attention_corpus());
    let err = h
        .pipeline
        .answer(
            AnswerRequest::new("attention mechanism", AnswerMode::MultiDocument)
                .papers(Vec::<String>::new()),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RagError::InvalidQuery(_)));
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.searches.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.fetches.load(Ordering::SeqCst), 0);
    assert!(h.log.entries().await.is_empty());
}

#[tokio::test]
async fn multi_document_stays_inside_paper_set() {
    let h = harness(attention_corpus());
    let ans = h
        .pipeline
        .answer(
            AnswerRequest::new("attention mechanism", AnswerMode::MultiDocument).papers(["B", "C"]),
        )
        .await
        .unwrap();

    assert!(papers_of(&ans).iter().all(|p| *p == "B" || *p == "C"));
    assert!(papers_of(&ans).contains(&"B"));
}

#[tokio::test]
async fn repeated_query_is_served_from_cache() {
    let h = harness(attention_corpus());
    let req = AnswerRequest::new("attention mechanism", AnswerMode::Detailed).top_k(4);

    let first = h.pipeline.answer(req.clone()).await.unwrap();
    let embeds = h.embedder.calls.load(Ordering::SeqCst);
    let searches = h.store.searches.load(Ordering::SeqCst);
    let second = h.pipeline.answer(req).await.unwrap();

    let ids = |a: &paper_rag::RagAnswer| -> Vec<String> {
        a.ranked.candidates.iter().map(|c| c.id().to_string()).collect()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), embeds);
    assert_eq!(h.store.searches.load(Ordering::SeqCst), searches);
}

#[tokio::test]
async fn vanished_chunks_are_dropped_not_fatal() {
    let mut indexed = attention_corpus();
    indexed.push(chunk(
        "ghost",
        "G",
        "Deleted Paper",
        "attention mechanism attention mechanism",
        20,
    ));
    let index = Arc::new(MemoryStore::with_chunks(indexed));
    let store = Arc::new(MemoryStore::with_chunks(attention_corpus()));
    let pipeline = RagPipeline::new(
        test_config(),
        Collaborators {
            embedder: Arc::new(BowEmbedder::default()),
            index,
            store,
            generator: Arc::new(ExtractiveGenerator::default()),
            log: Arc::new(MemoryQueryLog::new()),
        },
    )
    .unwrap();

    let ans = pipeline
        .answer(AnswerRequest::new("attention mechanism", AnswerMode::Detailed))
        .await
        .unwrap();

    assert_eq!(ans.diagnostics.dropped_chunks, vec!["ghost".to_string()]);
    assert!(ans.ranked.candidates.iter().all(|c| c.id() != "ghost"));
    assert!(
        ans.caveats
            .iter()
            .any(|c| matches!(c, Caveat::DroppedChunks { count: 1 }))
    );
}

#[tokio::test]
async fn generation_failure_is_logged() {
    let cfg = RagConfig {
        extractive_fallback: false,
        ..test_config()
    };
    let h = harness_with(cfg, attention_corpus(), Arc::new(FailingGenerator));

    let err = h
        .pipeline
        .answer(AnswerRequest::new("attention mechanism", AnswerMode::Concise))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::GenerationFailed { .. }));

    let log = h.log.entries().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].final_state, PipelineState::Failed);
    assert_eq!(log[0].failure.as_deref(), Some("generation failed: model overloaded"));
}

#[tokio::test]
async fn generation_timeout_falls_back() {
    let cfg = RagConfig {
        generation_timeout: Duration::from_millis(20),
        ..test_config()
    };
    let h = harness_with(cfg, attention_corpus(), Arc::new(SlowGenerator));

    let ans = h
        .pipeline
        .answer(AnswerRequest::new("attention mechanism", AnswerMode::Concise))
        .await
        .unwrap();
    assert!(ans.caveats.iter().any(|c| matches!(
        c,
        Caveat::GenerationFallback { reason } if reason.contains("timed out")
    )));
}

#[tokio::test]
async fn nothing_relevant_is_a_typed_error() {
    let h = harness(Vec::new());
    let err = h
        .pipeline
        .answer(AnswerRequest::new("attention mechanism", AnswerMode::Concise))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::NoRelevantContext));
    assert_eq!(h.log.entries().await[0].final_state, PipelineState::Failed);
}

#[tokio::test]
async fn cancelled_query_writes_no_log() {
    let token = CancelToken::new();
    let h = harness_with(
        test_config(),
        attention_corpus(),
        Arc::new(AbandoningGenerator {
            token: token.clone(),
        }),
    );

    let err = h
        .pipeline
        .answer_with_cancel(
            AnswerRequest::new("attention mechanism", AnswerMode::Concise),
            &token,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Cancelled));
    assert!(h.log.entries().await.is_empty());
}

#[tokio::test]
async fn invalid_config_update_is_rejected() {
    let h = harness(attention_corpus());
    let bad = RagConfig {
        diversity_divisor: 0,
        ..test_config()
    };
    assert!(matches!(
        h.pipeline.update_config(bad).await,
        Err(RagError::Config(_))
    ));

    let zero_weights = RagConfig {
        semantic_weight: 0.0,
        keyword_weight: 0.0,
        ..test_config()
    };
    h.pipeline.update_config(zero_weights).await.unwrap();
    assert_eq!(h.pipeline.config_snapshot().await.semantic_weight, 0.0);

    let ans = h
        .pipeline
        .answer(AnswerRequest::new("attention mechanism", AnswerMode::Concise))
        .await
        .unwrap();
    assert!(!ans.ranked.is_empty());
}

fn pipeline_over(index: Arc<dyn SemanticIndex>, log: Arc<dyn QueryLogSink>) -> RagPipeline {
    let store = Arc::new(MemoryStore::with_chunks(attention_corpus()));
    RagPipeline::new(
        test_config(),
        Collaborators {
            embedder: Arc::new(BowEmbedder::default()),
            index,
            store,
            generator: Arc::new(ExtractiveGenerator::default()),
            log,
        },
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn index_outage_degrades_to_keyword_only() {
    let log = Arc::new(MemoryQueryLog::new());
    let pipeline = pipeline_over(Arc::new(DownIndex), log.clone());

    let ans = pipeline
        .answer(AnswerRequest::new("attention mechanism", AnswerMode::Detailed).top_k(4))
        .await
        .unwrap();

    assert!(ans.diagnostics.degraded);
    assert_eq!(ans.diagnostics.final_state, PipelineState::Logged);
    assert!(!ans.ranked.is_empty());
    assert!(ans.ranked.candidates.iter().all(|c| c.scores.semantic == 0.0));
    assert!(log.entries().await[0].degraded);
}

#[tokio::test(start_paused = true)]
async fn index_timeout_degrades_like_an_outage() {
    let log = Arc::new(MemoryQueryLog::new());
    let pipeline = pipeline_over(Arc::new(HangingIndex), log.clone());

    let ans = tokio::time::timeout(
        Duration::from_secs(600),
        pipeline.answer(AnswerRequest::new("attention mechanism", AnswerMode::Concise).top_k(3)),
    )
    .await
    .expect("query must finish once the index times out")
    .unwrap();

    assert!(ans.diagnostics.degraded);
    assert_eq!(ans.diagnostics.final_state, PipelineState::Logged);
    assert!(ans.diagnostics.trace.contains(&PipelineState::Generated));
    assert!(!ans.ranked.is_empty());
    assert_eq!(log.entries().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_log_sink_does_not_hold_the_answer() {
    let store = Arc::new(MemoryStore::with_chunks(attention_corpus()));
    let pipeline = pipeline_over(store, Arc::new(StalledLog));

    let ans = tokio::time::timeout(
        Duration::from_secs(600),
        pipeline.answer(AnswerRequest::new("attention mechanism", AnswerMode::Concise).top_k(3)),
    )
    .await
    .expect("answer must not wait on the query log")
    .unwrap();
    assert_eq!(ans.diagnostics.final_state, PipelineState::Logged);
    assert!(!ans.answer.is_empty());

    // The failure path logs too and must not hang either.
    let empty = Arc::new(MemoryStore::new());
    let pipeline = RagPipeline::new(
        test_config(),
        Collaborators {
            embedder: Arc::new(BowEmbedder::default()),
            index: empty.clone(),
            store: empty,
            generator: Arc::new(ExtractiveGenerator::default()),
            log: Arc::new(StalledLog),
        },
    )
    .unwrap();
    let err = tokio::time::timeout(
        Duration::from_secs(600),
        pipeline.answer(AnswerRequest::new("attention mechanism", AnswerMode::Concise)),
    )
    .await
    .expect("failed query must not wait on the query log")
    .unwrap_err();
    assert!(matches!(err, RagError::NoRelevantContext), "{err}");
}
