//! Error types shared across the pipeline.

use thiserror::Error;

/// Failures surfaced by the core pipeline.
///
/// The retrieval engine treats these variants differently: an
/// [`HarnessError::Embedding`] during retrieval degrades to an empty result
/// set so the request can still produce a "no information found" answer,
/// while an [`HarnessError::Store`] is fatal for the request and must reach
/// the caller as retrieval-unavailable.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The embedding backend was unreachable or returned an invalid payload.
    #[error("embedding backend failure: {0}")]
    Embedding(String),

    /// The vector store could not be queried.
    #[error("vector store failure: {0}")]
    Store(String),

    /// The LLM chat backend failed; callers fall back to template synthesis.
    #[error("llm backend failure: {0}")]
    Llm(String),

    /// Invalid configuration detected at construction time.
    #[error("configuration error: {0}")]
    Config(String),
}
