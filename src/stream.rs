//! Streaming transcoder.
//!
//! Re-emits a complete synthesized answer as an ordered sequence of
//! [`StreamFrame`]s: one `Chunk` per answer line (headers paced slightly
//! slower than body lines), terminated by a `Complete` frame carrying the
//! sources and structured fields, or a single `Error` frame on failure.
//!
//! The stream is lazy and single-pass; dropping it cancels emission. The
//! concatenation of all `Chunk` contents equals the non-streaming answer
//! text exactly, so clients never observe different content between modes.

use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use tracing::error;

use answer_harness_core::models::StreamFrame;
use answer_harness_core::retrieve::Retriever;
use answer_harness_core::stream::{pacing_millis, tokenize_answer};

use crate::answer::Synthesizer;

/// Run the full pipeline for one question and stream the answer.
pub fn answer_stream(
    retriever: Arc<Retriever>,
    synthesizer: Arc<Synthesizer>,
    question: String,
    tenant_id: String,
    session_id: String,
) -> impl Stream<Item = StreamFrame> + Send {
    async_stream::stream! {
        let passages = match retriever.retrieve(&question, &tenant_id).await {
            Ok(passages) => passages,
            Err(err) => {
                error!(error = %err, tenant_id, "retrieval failed mid-stream");
                yield StreamFrame::Error {
                    message: "Failed to process chat query".to_string(),
                };
                return;
            }
        };

        let answer = synthesizer.synthesize(&question, &passages).await;

        for token in tokenize_answer(&answer.text) {
            let millis = pacing_millis(token.kind);
            yield StreamFrame::Chunk {
                content: token.text,
            };
            if millis > 0 {
                tokio::time::sleep(Duration::from_millis(millis)).await;
            }
        }

        yield StreamFrame::Complete {
            session_id,
            sources: answer.sources,
            contact_info: answer.structured.contacts,
            categories: answer.structured.categories,
            providers: answer.structured.providers,
        };
    }
}

/// Serialize a frame as the JSON payload of one SSE message.
///
/// The server hands this to axum's SSE writer, which adds the
/// `data: <JSON>\n\n` framing the chat layer expects.
pub fn frame_json(frame: &StreamFrame) -> String {
    serde_json::to_string(frame).unwrap_or_else(|_| {
        r#"{"type":"error","message":"frame serialization failed"}"#.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use answer_harness_core::models::ContactSheet;

    #[test]
    fn chunk_frame_serializes_with_type_tag() {
        let frame = StreamFrame::Chunk {
            content: "hello\n".to_string(),
        };
        let json = frame_json(&frame);
        assert!(json.contains("\"type\":\"chunk\""));
        assert!(json.contains("\"content\":\"hello\\n\""));
    }

    #[test]
    fn complete_frame_carries_metadata_fields() {
        let frame = StreamFrame::Complete {
            session_id: "s-1".to_string(),
            sources: vec!["passage".to_string()],
            contact_info: ContactSheet::default(),
            categories: vec!["food".to_string()],
            providers: vec![],
        };
        let json = frame_json(&frame);
        assert!(json.contains("\"type\":\"complete\""));
        assert!(json.contains("\"session_id\":\"s-1\""));
        assert!(json.contains("\"contact_info\""));
        assert!(json.contains("\"categories\""));
        assert!(json.contains("\"providers\""));
    }

    #[test]
    fn error_frame_carries_message() {
        let frame = StreamFrame::Error {
            message: "boom".to_string(),
        };
        let json = frame_json(&frame);
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("\"message\":\"boom\""));
    }
}
