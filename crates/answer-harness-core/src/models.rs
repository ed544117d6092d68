//! Core data models used throughout Answer Harness.
//!
//! These types represent the passages, extractions, and answers that flow
//! through the ingestion and question-answering pipeline.

use serde::{Deserialize, Serialize};

/// A chunk of a source document stored with its embedding vector.
///
/// Passages are immutable once created: they are produced during ingestion
/// and deleted only alongside their parent document. All passages and all
/// query embeddings within a deployment share one fixed dimensionality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    /// Owning tenant. Every store query filters on this column; passages
    /// from different tenants never appear in the same result set.
    pub tenant_id: String,
    /// Parent document grouping; deleting the document removes its passages.
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    /// Unit-length (L2-normalized) embedding vector.
    pub embedding: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// A single row returned from a tenant-scoped similarity search, ordered by
/// ascending distance to the query vector.
#[derive(Debug, Clone)]
pub struct PassageHit {
    pub content: String,
    /// Cosine distance (`1 - similarity`) on unit vectors.
    pub distance: f32,
}

/// Contact fields mined from retrieved passages. Each list is deduplicated
/// and capped at three entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactSheet {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub websites: Vec<String>,
    pub addresses: Vec<String>,
}

impl ContactSheet {
    /// True when no contact field holds any entry.
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
            && self.phones.is_empty()
            && self.websites.is_empty()
            && self.addresses.is_empty()
    }
}

/// Structured fields derived from a retrieval result. Recomputed per request
/// and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredExtraction {
    pub providers: Vec<String>,
    pub categories: Vec<String>,
    pub contacts: ContactSheet,
    /// The most readable description found among the passages, if any.
    pub description: Option<String>,
}

/// The final answer for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizedAnswer {
    pub text: String,
    /// Verbatim retrieved passage contents, in retrieval order.
    pub sources: Vec<String>,
    pub structured: StructuredExtraction,
}

/// One frame of a streamed answer.
///
/// Frames are emitted strictly in order; the terminal frame is always
/// `Complete` or `Error`. Serialized with a lowercase `type` tag matching the
/// wire contract consumed by the chat layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    Chunk {
        content: String,
    },
    Complete {
        session_id: String,
        sources: Vec<String>,
        contact_info: ContactSheet,
        categories: Vec<String>,
        providers: Vec<String>,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_serializes_with_type_tag() {
        let frame = StreamFrame::Chunk {
            content: "hello".into(),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "chunk");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn complete_frame_carries_structured_payload() {
        let frame = StreamFrame::Complete {
            session_id: "s1".into(),
            sources: vec!["passage".into()],
            contact_info: ContactSheet::default(),
            categories: vec!["food".into()],
            providers: vec![],
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["categories"][0], "food");
    }

    #[test]
    fn empty_contact_sheet_reports_empty() {
        assert!(ContactSheet::default().is_empty());
        let sheet = ContactSheet {
            phones: vec!["(555) 123-4567".into()],
            ..Default::default()
        };
        assert!(!sheet.is_empty());
    }
}
