//! Mappers between Qdrant payloads and [`Chunk`]s.
//!
//! Payload layout (flat, one point per chunk):
//! `chunk_id`, `paper_id`, `text`, `position` (alias `chunk_index`),
//! `title`, `authors`, `year`, `source`, `citation_count`, `pdf_url`,
//! `abstract`, `created_at` (RFC3339).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use qdrant_client::qdrant::Value as QValue;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::record::{Chunk, PaperMeta};

/// Deterministic UUIDv5 point id for a chunk id.
pub fn stable_uuid(id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes())
}

/// Converts a Qdrant payload map into plain JSON.
pub fn qpayload_to_json(p: HashMap<String, QValue>) -> Value {
    let m = p.into_iter().map(|(k, v)| (k, v.into_json())).collect();
    Value::Object(m)
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    chunk_id: String,
    paper_id: String,
    #[serde(default)]
    text: String,
    #[serde(default, alias = "chunk_index")]
    position: usize,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    meta: PaperMeta,
}

/// Builds a [`Chunk`] from a JSON payload. Vectors are not part of the payload.
pub fn chunk_from_payload(payload: Value) -> Result<Chunk, StoreError> {
    let p: ChunkPayload = serde_json::from_value(payload)?;
    Ok(Chunk {
        id: p.chunk_id,
        paper_id: p.paper_id,
        text: p.text,
        position: p.position,
        embedding: Vec::new(),
        meta: p.meta,
        created_at: p.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    })
}

/// Reads only the chunk id from a payload.
pub fn chunk_id_of(payload: &HashMap<String, QValue>) -> Option<String> {
    payload
        .get("chunk_id")
        .and_then(|v| v.clone().into_json().as_str().map(str::to_owned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_flat_payload_into_chunk() {
        let c = chunk_from_payload(json!({
            "chunk_id": "p1#3",
            "paper_id": "p1",
            "text": "Attention is all you need.",
            "chunk_index": 3,
            "title": "Attention Is All You Need",
            "authors": ["Vaswani", "Shazeer"],
            "year": 2017,
            "source": "arxiv",
            "citation_count": 90000,
            "created_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(c.id, "p1#3");
        assert_eq!(c.position, 3);
        assert_eq!(c.meta.title, "Attention Is All You Need");
        assert_eq!(c.meta.year, Some(2017));
        assert_eq!(c.created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn missing_ids_fail_to_parse() {
        assert!(matches!(
            chunk_from_payload(json!({ "text": "orphan" })),
            Err(StoreError::Parse(_))
        ));
    }

    #[test]
    fn stable_uuid_is_deterministic() {
        assert_eq!(stable_uuid("p1#0"), stable_uuid("p1#0"));
        assert_ne!(stable_uuid("p1#0"), stable_uuid("p1#1"));
    }
}
