//! Append-only query log and usage statistics.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api_types::PipelineState;
use crate::mode::AnswerMode;

/// One record per finished query (successful or failed). Never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub query: String,
    pub answer: String,
    pub paper_ids: Vec<String>,
    pub chunk_count: usize,
    pub mode: AnswerMode,
    pub generator: String,
    pub elapsed_ms: u64,
    pub created_at: DateTime<Utc>,
    pub final_state: PipelineState,
    #[serde(default)]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

pub type LogFuture<'a> = Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>;

/// Destination for log entries. Failures are reported to the caller, who
/// only warns about them.
pub trait QueryLogSink: Send + Sync {
    fn append<'a>(&'a self, entry: &'a QueryLogEntry) -> LogFuture<'a>;
}

/// JSON-lines file, one entry per line.
pub struct JsonlQueryLog {
    path: PathBuf,
    // Serializes appends so concurrent lines never interleave.
    write_lock: Mutex<()>,
}

impl JsonlQueryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every well-formed entry. A missing file is an empty log;
    /// malformed lines are skipped with a warning.
    pub async fn read_all(&self) -> io::Result<Vec<QueryLogEntry>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut out = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(e) => out.push(e),
                Err(e) => warn!(line = lineno + 1, error = %e, "skipping malformed query log line"),
            }
        }
        Ok(out)
    }
}

impl QueryLogSink for JsonlQueryLog {
    fn append<'a>(&'a self, entry: &'a QueryLogEntry) -> LogFuture<'a> {
        Box::pin(async move {
            let mut line = serde_json::to_string(entry).map_err(io::Error::other)?;
            line.push('\n');

            let _guard = self.write_lock.lock().await;
            let mut f = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            f.write_all(line.as_bytes()).await?;
            f.flush().await?;
            debug!(path = %self.path.display(), "query logged");
            Ok(())
        })
    }
}

/// In-process log, for tests and embedded analytics.
#[derive(Default)]
pub struct MemoryQueryLog {
    entries: Mutex<Vec<QueryLogEntry>>,
}

impl MemoryQueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<QueryLogEntry> {
        self.entries.lock().await.clone()
    }
}

impl QueryLogSink for MemoryQueryLog {
    fn append<'a>(&'a self, entry: &'a QueryLogEntry) -> LogFuture<'a> {
        Box::pin(async move {
            self.entries.lock().await.push(entry.clone());
            Ok(())
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QueryStats {
    pub total_queries: usize,
    pub avg_elapsed_ms: f64,
    /// `(query, count)`, most frequent first.
    pub most_common_queries: Vec<(String, usize)>,
    /// `(paper_id, times used)`, most used first.
    pub top_papers: Vec<(String, usize)>,
}

/// Aggregates `entries` keeping the `top_n` most frequent queries and papers.
/// Ties are ordered alphabetically.
pub fn query_stats(entries: &[QueryLogEntry], top_n: usize) -> QueryStats {
    if entries.is_empty() {
        return QueryStats::default();
    }
    let total = entries.len();
    let avg = entries.iter().map(|e| e.elapsed_ms as f64).sum::<f64>() / total as f64;

    let mut queries: HashMap<&str, usize> = HashMap::new();
    let mut papers: HashMap<&str, usize> = HashMap::new();
    for e in entries {
        *queries.entry(e.query.as_str()).or_default() += 1;
        for p in &e.paper_ids {
            *papers.entry(p.as_str()).or_default() += 1;
        }
    }

    QueryStats {
        total_queries: total,
        avg_elapsed_ms: avg,
        most_common_queries: top(queries, top_n),
        top_papers: top(papers, top_n),
    }
}

fn top(counts: HashMap<&str, usize>, n: usize) -> Vec<(String, usize)> {
    let mut v: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, c)| (k.to_string(), c))
        .collect();
    v.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    v.truncate(n);
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(query: &str, papers: &[&str], ms: u64) -> QueryLogEntry {
        QueryLogEntry {
            query: query.into(),
            answer: "a".into(),
            paper_ids: papers.iter().map(|p| p.to_string()).collect(),
            chunk_count: papers.len(),
            mode: AnswerMode::Concise,
            generator: "extractive".into(),
            elapsed_ms: ms,
            created_at: Utc::now(),
            final_state: PipelineState::Logged,
            degraded: false,
            failure: None,
        }
    }

    #[test]
    fn stats_count_queries_and_papers() {
        let entries = vec![
            entry("gnn", &["p1", "p2"], 10),
            entry("gnn", &["p1"], 20),
            entry("rl", &["p3"], 30),
        ];
        let s = query_stats(&entries, 2);
        assert_eq!(s.total_queries, 3);
        assert!((s.avg_elapsed_ms - 20.0).abs() < 1e-9);
        assert_eq!(s.most_common_queries[0], ("gnn".to_string(), 2));
        assert_eq!(s.top_papers, vec![("p1".to_string(), 2), ("p2".to_string(), 1)]);
    }

    #[test]
    fn empty_log_has_zero_stats() {
        assert_eq!(query_stats(&[], 5), QueryStats::default());
    }

    #[tokio::test]
    async fn jsonl_appends_and_reads_back() {
        let path = std::env::temp_dir().join(format!(
            "paper-rag-log-{}-{}.jsonl",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let log = JsonlQueryLog::new(&path);
        assert!(log.read_all().await.unwrap().is_empty());

        log.append(&entry("one", &["p1"], 5)).await.unwrap();
        log.append(&entry("two", &[], 7)).await.unwrap();
        let back = log.read_all().await.unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1].query, "two");

        let _ = tokio::fs::remove_file(&path).await;
    }
}
