//! Phrase-based question intent, used to pick an answer mode when the
//! caller does not name one.

use serde::Serialize;

use crate::mode::AnswerMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Factual,
    Comparison,
    HowTo,
    Explanation,
    LiteratureSurvey,
}

/// Cue phrases per intent. Earlier rows win ties.
const CUES: [(QueryIntent, &[&str]); 5] = [
    (
        QueryIntent::Factual,
        &["what is", "what are", "define", "definition of", "meaning of"],
    ),
    (
        QueryIntent::Comparison,
        &["compare", "difference between", "vs.", "versus", "contrast"],
    ),
    (
        QueryIntent::HowTo,
        &["how to", "how do", "how can", "steps to", "method to"],
    ),
    (
        QueryIntent::Explanation,
        &["explain", "why", "how does", "how works", "describe"],
    ),
    (
        QueryIntent::LiteratureSurvey,
        &["survey", "review", "overview of", "state of the art", "literature on"],
    ),
];

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct IntentGuess {
    pub intent: QueryIntent,
    /// 0.3 when nothing matched, otherwise cue hits / 3 capped at 1.
    pub confidence: f32,
}

impl QueryIntent {
    pub fn recommended_mode(self) -> AnswerMode {
        match self {
            QueryIntent::Comparison => AnswerMode::Compare,
            QueryIntent::Explanation => AnswerMode::Explain,
            QueryIntent::LiteratureSurvey => AnswerMode::Survey,
            QueryIntent::Factual | QueryIntent::HowTo => AnswerMode::Detailed,
        }
    }
}

/// Counts cue occurrences per intent; a question with no cue is factual.
pub fn classify(question: &str) -> IntentGuess {
    let lower = question.to_lowercase();
    let mut best = (QueryIntent::Factual, 0usize);
    for (intent, cues) in CUES {
        let hits: usize = cues.iter().map(|c| lower.matches(c).count()).sum();
        if hits > best.1 {
            best = (intent, hits);
        }
    }
    let confidence = match best.1 {
        0 => 0.3,
        n => (n as f32 / 3.0).min(1.0),
    };
    IntentGuess {
        intent: best.0,
        confidence,
    }
}
