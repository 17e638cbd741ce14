use std::sync::Arc;

use ai_llm_service::LlmProfiles;
use ai_llm_service::config::default_config::profiles_from_env;
use anyhow::Context;
use clap::Parser;
use paper_rag::{
    AnswerMode, AnswerRequest, Collaborators, JsonlQueryLog, LlmGenerator, RagConfig, RagError,
    RagPipeline, telemetry,
};
use paper_store::{LlmEmbedder, QdrantStore, StoreConfig};
use tracing::{Level, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine; the process environment still applies.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(telemetry::env_filter_with_level("info", Level::INFO))
        .with(telemetry::layer())
        .try_init()
        .context("installing tracing subscriber")?;

    let req = cli.into_request();

    let rag_cfg = RagConfig::from_env()?;
    let store_cfg = StoreConfig::from_env()?;
    let (generation, embedding) = profiles_from_env()?;
    let llm = Arc::new(LlmProfiles::new(generation, embedding));

    let qdrant = Arc::new(QdrantStore::new(&store_cfg)?);
    let log = Arc::new(JsonlQueryLog::new(rag_cfg.query_log_path.clone()));

    let pipeline = RagPipeline::new(
        rag_cfg,
        Collaborators {
            embedder: Arc::new(LlmEmbedder::new(llm.clone(), store_cfg.embedding_dim)),
            index: qdrant.clone(),
            store: qdrant,
            generator: Arc::new(LlmGenerator::new(llm)),
            log,
        },
    )?;

    info!(collection = %store_cfg.collection, mode = %req.mode, "answering");
    let answer = pipeline.answer(req).await?;
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}

/// Answers one question over the indexed paper collection and prints the
/// result as JSON.
#[derive(Parser, Debug)]
#[command(name = "paper-rag-backend", version)]
struct Cli {
    /// Answer mode, or `auto` to pick one from the question's phrasing
    #[arg(long, value_name = "MODE", default_value = "auto", value_parser = parse_mode)]
    mode: ModeChoice,

    /// Number of ranked chunks (0 = the mode's default)
    #[arg(long, value_name = "N", default_value_t = 0)]
    top_k: usize,

    /// Restrict retrieval to these paper ids (required for multi_document)
    #[arg(long, value_name = "ID,ID", value_delimiter = ',')]
    papers: Vec<String>,

    /// The question
    #[arg(required = true, num_args = 1.., value_name = "QUESTION")]
    question: Vec<String>,
}

#[derive(Clone, Copy, Debug)]
enum ModeChoice {
    Auto,
    Fixed(AnswerMode),
}

fn parse_mode(s: &str) -> Result<ModeChoice, String> {
    if s.trim().eq_ignore_ascii_case("auto") {
        return Ok(ModeChoice::Auto);
    }
    s.parse().map(ModeChoice::Fixed).map_err(|e: RagError| e.to_string())
}

impl Cli {
    fn into_request(self) -> AnswerRequest {
        let question = self.question.join(" ");
        let mode = match self.mode {
            ModeChoice::Fixed(m) => m,
            ModeChoice::Auto => {
                let m = AnswerMode::recommend(&question);
                info!(mode = %m, "answer mode picked from question");
                m
            }
        };
        let papers: Vec<String> = self
            .papers
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let mut req = AnswerRequest::new(question, mode).top_k(self.top_k);
        if !papers.is_empty() {
            req = req.papers(papers);
        }
        req
    }
}
