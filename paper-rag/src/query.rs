//! Query normalization and expansion.
//!
//! Both steps are pure and deterministic: the same raw text always yields
//! the same normalized form and the same ordered variant list.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::RagError;
use crate::keyword;
use crate::mode::AnswerMode;

/// Accepted raw query length in characters (after trimming).
pub const MAX_QUERY_CHARS: usize = 1000;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "what", "how", "why", "when", "where", "which", "who", "does", "do",
    "can", "about", "from", "between", "this", "that", "these", "those", "it", "its", "be",
];

const ACRONYMS: &[(&str, &str)] = &[
    ("nlp", "natural language processing"),
    ("ml", "machine learning"),
    ("dl", "deep learning"),
    ("ai", "artificial intelligence"),
    ("cv", "computer vision"),
    ("rl", "reinforcement learning"),
    ("llm", "large language model"),
    ("gan", "generative adversarial network"),
    ("cnn", "convolutional neural network"),
    ("rnn", "recurrent neural network"),
];

const SYNONYMS: &[(&str, &[&str])] = &[
    ("neural network", &["deep learning", "artificial neural network"]),
    ("transformer", &["attention mechanism", "self attention"]),
    ("attention mechanism", &["transformer"]),
    ("machine learning", &["statistical learning"]),
    ("natural language processing", &["computational linguistics"]),
    ("large language model", &["foundation model"]),
];

/// A submitted question. Immutable once built.
#[derive(Clone, Debug, Serialize)]
pub struct Query {
    raw: String,
    normalized: String,
    variants: Vec<String>,
    mode: AnswerMode,
    top_k: usize,
}

impl Query {
    /// Normalizes and expands `raw`.
    ///
    /// # Errors
    /// [`RagError::InvalidQuery`] for empty, punctuation-only or over-long input.
    pub fn new(
        raw: &str,
        mode: AnswerMode,
        top_k: usize,
        max_expansions: usize,
    ) -> Result<Self, RagError> {
        let normalized = normalize(raw)?;
        let variants = expand(&normalized, max_expansions);
        Ok(Self {
            raw: raw.trim().to_string(),
            normalized,
            variants,
            mode,
            top_k,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn mode(&self) -> AnswerMode {
        self.mode
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Normalized text followed by every variant; the retrieval fan-out set.
    pub fn search_texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.normalized.as_str()).chain(self.variants.iter().map(String::as_str))
    }

    /// Keyword token set of the normalized text.
    pub fn tokens(&self) -> HashSet<String> {
        keyword::tokens(&self.normalized)
    }
}

/// Trims, case-folds, replaces punctuation with spaces and collapses whitespace.
pub fn normalize(raw: &str) -> Result<String, RagError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RagError::InvalidQuery("query is empty".into()));
    }
    let len = trimmed.chars().count();
    if len > MAX_QUERY_CHARS {
        return Err(RagError::InvalidQuery(format!(
            "query is {len} characters, at most {MAX_QUERY_CHARS} allowed"
        )));
    }

    let folded: String = trimmed
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let normalized = folded.split_whitespace().collect::<Vec<_>>().join(" ");

    if normalized.is_empty() {
        return Err(RagError::InvalidQuery(
            "query has no searchable terms".into(),
        ));
    }
    Ok(normalized)
}

/// Produces at most `max` distinct variants of an already normalized query.
///
/// Order: acronym swaps, synonym substitutions, compound broadening,
/// key terms, singular/plural toggle.
pub fn expand(normalized: &str, max: usize) -> Vec<String> {
    let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::from([normalized.to_string()]);
    let mut push = |v: String, out: &mut Vec<String>| {
        if !v.is_empty() && seen.insert(v.clone()) {
            out.push(v);
        }
    };

    for (short, long) in ACRONYMS {
        let long_toks: Vec<&str> = long.split(' ').collect();
        if let Some(i) = find_phrase(&tokens, &[*short]) {
            push(replace_span(&tokens, i, 1, long), &mut out);
        } else if let Some(i) = find_phrase(&tokens, &long_toks) {
            push(replace_span(&tokens, i, long_toks.len(), short), &mut out);
        }
    }

    for (term, syns) in SYNONYMS {
        let term_toks: Vec<&str> = term.split(' ').collect();
        if let Some(i) = find_phrase(&tokens, &term_toks) {
            for syn in *syns {
                push(replace_span(&tokens, i, term_toks.len(), syn), &mut out);
            }
        }
    }

    // "graph neural network" broadens to "neural network".
    for phrase in multi_word_terms() {
        let p: Vec<&str> = phrase.split(' ').collect();
        if let Some(i) = find_phrase(&tokens, &p) {
            if i > 0 && !is_stop_word(tokens[i - 1]) {
                push(replace_span(&tokens, i - 1, 1, ""), &mut out);
            }
        }
    }

    let key_terms: Vec<&str> = tokens.iter().copied().filter(|t| !is_stop_word(t)).collect();
    push(key_terms.join(" "), &mut out);

    if let Some(i) = tokens
        .iter()
        .rposition(|t| !is_stop_word(t) && t.chars().count() > 3 && !t.ends_with("ss"))
    {
        let tok = tokens[i];
        let toggled = match tok.strip_suffix('s') {
            Some(stem) => stem.to_string(),
            None => format!("{tok}s"),
        };
        push(replace_span(&tokens, i, 1, &toggled), &mut out);
    }

    out.truncate(max);
    out
}

fn is_stop_word(t: &str) -> bool {
    STOP_WORDS.contains(&t)
}

fn multi_word_terms() -> impl Iterator<Item = &'static str> {
    ACRONYMS
        .iter()
        .map(|(_, long)| *long)
        .chain(SYNONYMS.iter().map(|(term, _)| *term))
        .filter(|t| t.contains(' '))
}

/// A query token matches a lexicon token exactly or as its plural.
fn same_term(tok: &str, pat: &str) -> bool {
    tok == pat || tok.strip_suffix('s') == Some(pat)
}

fn find_phrase(tokens: &[&str], phrase: &[&str]) -> Option<usize> {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return None;
    }
    (0..=tokens.len() - phrase.len()).find(|&i| {
        phrase
            .iter()
            .enumerate()
            .all(|(j, p)| same_term(tokens[i + j], p))
    })
}

fn replace_span(tokens: &[&str], start: usize, len: usize, replacement: &str) -> String {
    tokens[..start]
        .iter()
        .copied()
        .chain(std::iter::once(replacement))
        .chain(tokens[start + len..].iter().copied())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
