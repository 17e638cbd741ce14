//! Core data models used by the library.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Paper-level metadata attached to every chunk of the paper.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    /// Source-system tag, e.g. `arxiv`, `semantic_scholar`, `upload`.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub citation_count: Option<u32>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
}

/// A contiguous span of a paper's extracted text; the unit of retrieval.
///
/// Chunks are produced by ingestion and only read here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub paper_id: String,
    pub text: String,
    /// Position of the chunk inside its paper (0-based).
    pub position: usize,
    /// Stored vector; may be empty when the backend does not return vectors.
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub meta: PaperMeta,
    pub created_at: DateTime<Utc>,
}

/// Restricts retrieval to an explicit set of paper identifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaperFilter {
    pub paper_ids: BTreeSet<String>,
}

impl PaperFilter {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paper_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paper_ids.is_empty()
    }

    pub fn allows(&self, paper_id: &str) -> bool {
        self.paper_ids.contains(paper_id)
    }
}

/// Helper for `Option<&PaperFilter>` call sites: no filter admits everything.
pub fn admits(filter: Option<&PaperFilter>, paper_id: &str) -> bool {
    filter.is_none_or(|f| f.allows(paper_id))
}
