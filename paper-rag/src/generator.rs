//! Answer generators.
//!
//! [`LlmGenerator`] prompts the generation profile of `ai-llm-service`.
//! [`ExtractiveGenerator`] needs no model: it quotes the leading sentences
//! of the top chunks and doubles as the best-effort fallback.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ai_llm_service::LlmProfiles;
use thiserror::Error;
use tracing::{Instrument, debug, error, info_span};

use crate::api_types::Citation;
use crate::candidate::Candidate;
use crate::mode::AnswerMode;
use crate::prompt::build_user_prompt;

#[derive(Debug, Error)]
#[error("{reason}")]
pub struct GenerationError {
    pub reason: String,
}

impl GenerationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct GeneratedAnswer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Input of one generation call.
#[derive(Clone, Copy, Debug)]
pub struct GenerationRequest<'a> {
    pub mode: AnswerMode,
    pub question: &'a str,
    /// Ordered context, best first.
    pub context: &'a [Candidate],
    pub max_ctx_chars: usize,
}

pub type GenFuture<'a> =
    Pin<Box<dyn Future<Output = Result<GeneratedAnswer, GenerationError>> + Send + 'a>>;

pub trait AnswerGenerator: Send + Sync {
    fn name(&self) -> &'static str;
    fn generate<'a>(&'a self, req: GenerationRequest<'a>) -> GenFuture<'a>;
}

/// One citation per context chunk, in context order.
pub fn citations_for(ctx: &[Candidate]) -> Vec<Citation> {
    ctx.iter()
        .map(|c| Citation {
            paper_id: c.chunk.paper_id.clone(),
            title: c.chunk.meta.title.clone(),
            chunk_index: c.chunk.position,
            chunk_id: c.chunk.id.clone(),
            relevance: c.relevance.map(|r| r.score).unwrap_or(0.0),
        })
        .collect()
}

pub struct LlmGenerator {
    svc: Arc<LlmProfiles>,
}

impl LlmGenerator {
    pub fn new(svc: Arc<LlmProfiles>) -> Self {
        Self { svc }
    }
}

impl AnswerGenerator for LlmGenerator {
    fn name(&self) -> &'static str {
        "llm"
    }

    fn generate<'a>(&'a self, req: GenerationRequest<'a>) -> GenFuture<'a> {
        let span = info_span!("llm_generate", mode = %req.mode, ctx = req.context.len());
        Box::pin(
            async move {
                let user = build_user_prompt(req.mode, req.question, req.context, req.max_ctx_chars);
                debug!(prompt_chars = user.len(), "prompt built");

                let text = self
                    .svc
                    .generate(&user, Some(req.mode.system_prompt()))
                    .await
                    .map_err(|e| {
                        error!(error = %e, "generation call failed");
                        GenerationError::new(e.to_string())
                    })?;

                let text = text.trim();
                if text.is_empty() {
                    return Err(GenerationError::new("model returned an empty answer"));
                }
                Ok(GeneratedAnswer {
                    text: text.to_string(),
                    citations: citations_for(req.context),
                })
            }
            .instrument(span),
        )
    }
}

/// Template answer from the first sentences of the top chunks.
#[derive(Clone, Debug)]
pub struct ExtractiveGenerator {
    pub max_chunks: usize,
    pub sentences_per_chunk: usize,
}

impl Default for ExtractiveGenerator {
    fn default() -> Self {
        Self {
            max_chunks: 3,
            sentences_per_chunk: 2,
        }
    }
}

impl ExtractiveGenerator {
    /// Synchronous core; never fails on non-empty context.
    pub fn extract(&self, req: GenerationRequest<'_>) -> Result<GeneratedAnswer, GenerationError> {
        let used: Vec<&Candidate> = req.context.iter().take(self.max_chunks).collect();
        if used.is_empty() {
            return Err(GenerationError::new("no context to extract from"));
        }

        let mut text = format!(
            "Relevant excerpts for \"{}\":\n",
            req.mode.generation_question(req.question.trim())
        );
        for (i, c) in used.iter().enumerate() {
            let title = match c.chunk.meta.title.trim() {
                "" => c.chunk.paper_id.as_str(),
                t => t,
            };
            text.push_str(&format!(
                "\n[{}] {} ({}): {}\n",
                i + 1,
                title,
                c.chunk.paper_id,
                leading_sentences(&c.chunk.text, self.sentences_per_chunk)
            ));
        }

        let ctx: Vec<Candidate> = used.into_iter().cloned().collect();
        Ok(GeneratedAnswer {
            text,
            citations: citations_for(&ctx),
        })
    }
}

impl AnswerGenerator for ExtractiveGenerator {
    fn name(&self) -> &'static str {
        "extractive"
    }

    fn generate<'a>(&'a self, req: GenerationRequest<'a>) -> GenFuture<'a> {
        Box::pin(async move { self.extract(req) })
    }
}

/// First `n` sentences of `text`; a sentence ends at `.`, `!` or `?`
/// followed by whitespace or the end of the text.
pub fn leading_sentences(text: &str, n: usize) -> String {
    let text = text.trim();
    let mut ends = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
            if boundary {
                ends += 1;
                if ends == n {
                    return text[..i + ch.len_utf8()].to_string();
                }
            }
        }
    }
    text.to_string()
}
