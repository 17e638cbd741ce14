//! Answer modes: a closed set of generation strategies.
//!
//! A mode never changes how candidates are retrieved. It decides the default
//! result count, the diversity cap divisor, which part of the ranked list
//! becomes generation context, and how the prompt is framed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cfg::RagConfig;
use crate::error::RagError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    Concise,
    Detailed,
    Explain,
    Compare,
    Survey,
    MultiDocument,
}

/// Which ranked candidates are handed to the generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextScope {
    /// Only chunks of the paper owning the top-ranked chunk.
    BestPaper,
    /// Every ranked chunk, across papers.
    AllPapers,
}

impl AnswerMode {
    pub const ALL: [AnswerMode; 6] = [
        AnswerMode::Concise,
        AnswerMode::Detailed,
        AnswerMode::Explain,
        AnswerMode::Compare,
        AnswerMode::Survey,
        AnswerMode::MultiDocument,
    ];

    /// Mode suggested by the question's phrasing (compare, explain, survey,
    /// otherwise detailed).
    pub fn recommend(question: &str) -> Self {
        crate::intent::classify(question).intent.recommended_mode()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnswerMode::Concise => "concise",
            AnswerMode::Detailed => "detailed",
            AnswerMode::Explain => "explain",
            AnswerMode::Compare => "compare",
            AnswerMode::Survey => "survey",
            AnswerMode::MultiDocument => "multi_document",
        }
    }

    /// Result count used when the caller passes `top_k = 0`.
    pub fn default_top_k(self) -> usize {
        match self {
            AnswerMode::Concise => 3,
            AnswerMode::Detailed => 8,
            AnswerMode::Explain => 5,
            AnswerMode::Compare => 10,
            AnswerMode::Survey => 15,
            AnswerMode::MultiDocument => 5,
        }
    }

    /// Distinct papers the context must span before generation is attempted.
    pub fn min_distinct_papers(self) -> usize {
        match self {
            AnswerMode::Compare | AnswerMode::Survey => 2,
            _ => 1,
        }
    }

    pub fn diversity_divisor(self, cfg: &RagConfig) -> usize {
        match self {
            AnswerMode::Compare | AnswerMode::Survey => cfg.compare_diversity_divisor,
            _ => cfg.diversity_divisor,
        }
    }

    pub fn context_scope(self) -> ContextScope {
        match self {
            AnswerMode::Concise | AnswerMode::Detailed | AnswerMode::Explain => {
                ContextScope::BestPaper
            }
            AnswerMode::Compare | AnswerMode::Survey | AnswerMode::MultiDocument => {
                ContextScope::AllPapers
            }
        }
    }

    /// Whether the prompt groups context blocks per paper.
    pub fn groups_by_paper(self) -> bool {
        matches!(
            self,
            AnswerMode::Compare | AnswerMode::Survey | AnswerMode::MultiDocument
        )
    }

    /// Question text as it is put to the generator.
    pub fn generation_question(self, question: &str) -> String {
        match self {
            AnswerMode::Survey => {
                format!("Provide a comprehensive literature survey on {question}")
            }
            _ => question.to_string(),
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            AnswerMode::Concise => {
                "You are a research assistant. Answer directly in two or three sentences \
                 using only the provided context."
            }
            AnswerMode::Detailed => {
                "You are a research assistant. Give a thorough answer with explanations, \
                 drawing on the provided context extensively and citing the papers you use."
            }
            AnswerMode::Explain => {
                "You are a research assistant explaining a difficult idea to a non-expert. \
                 Avoid jargon, prefer plain words, and use an analogy when it helps."
            }
            AnswerMode::Compare => {
                "You are a research assistant. Compare and contrast the approaches and findings \
                 of the papers in the context. Point out similarities, differences, strengths \
                 and weaknesses, organized by paper or by theme."
            }
            AnswerMode::Survey => {
                "You are a research assistant writing a literature survey. Use the sections \
                 Introduction, Key Approaches, Recent Advances, Challenges, Future Directions, \
                 and cite the papers throughout."
            }
            AnswerMode::MultiDocument => {
                "You are a research assistant synthesizing several papers. Highlight where they \
                 agree, where they disagree, and how they complement each other. Cite each paper."
            }
        }
    }
}

impl fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerMode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "concise" => Ok(AnswerMode::Concise),
            "detailed" => Ok(AnswerMode::Detailed),
            "explain" | "explain_simple" | "simple" => Ok(AnswerMode::Explain),
            "compare" => Ok(AnswerMode::Compare),
            "survey" | "literature_survey" | "literature_review" => Ok(AnswerMode::Survey),
            "multi_document" | "multi" => Ok(AnswerMode::MultiDocument),
            other => Err(RagError::InvalidQuery(format!("unknown answer mode `{other}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!("explain_simple".parse::<AnswerMode>().unwrap(), AnswerMode::Explain);
        assert_eq!("Multi-Document".parse::<AnswerMode>().unwrap(), AnswerMode::MultiDocument);
        assert_eq!("literature_survey".parse::<AnswerMode>().unwrap(), AnswerMode::Survey);
        assert!("poem".parse::<AnswerMode>().is_err());
    }

    #[test]
    fn as_str_round_trips_for_every_mode() {
        for m in AnswerMode::ALL {
            assert_eq!(m.as_str().parse::<AnswerMode>().unwrap(), m);
        }
    }

    #[test]
    fn multi_paper_modes_use_stricter_divisor() {
        let cfg = RagConfig::default();
        assert_eq!(AnswerMode::Compare.diversity_divisor(&cfg), 4);
        assert_eq!(AnswerMode::Concise.diversity_divisor(&cfg), 3);
        assert_eq!(AnswerMode::Survey.min_distinct_papers(), 2);
        assert_eq!(AnswerMode::Detailed.context_scope(), ContextScope::BestPaper);
    }

    #[test]
    fn survey_rephrases_question() {
        assert_eq!(
            AnswerMode::Survey.generation_question("graph transformers"),
            "Provide a comprehensive literature survey on graph transformers"
        );
        assert_eq!(AnswerMode::Concise.generation_question("x"), "x");
    }
}
