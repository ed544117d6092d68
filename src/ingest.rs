//! Ingestion pipeline orchestration.
//!
//! Turns `(raw_text, tenant_id)` into stored passages: optional structured
//! normalization, chunking, batch embedding, and insertion under a fresh
//! document id. Embedding failure aborts the ingestion; a passage without
//! a vector can never be retrieved, so there is nothing useful to persist.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use answer_harness_core::categories::CategoryVocabulary;
use answer_harness_core::chunk::chunk_text;
use answer_harness_core::embedding::Embedder;
use answer_harness_core::models::Passage;
use answer_harness_core::store::VectorStore;

use crate::config::Config;

/// Summary of one ingested document.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub document_id: String,
    pub chunk_count: usize,
    pub word_count: usize,
    pub normalized: bool,
}

/// Build the category vocabulary, merging custom synonyms when configured.
pub fn build_vocabulary(config: &Config) -> Result<CategoryVocabulary> {
    let mut vocabulary = CategoryVocabulary::default();

    if let Some(path) = &config.ingest.categories_path {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read categories file: {}", path.display()))?;
        let value: serde_json::Value =
            serde_json::from_str(&content).with_context(|| "Failed to parse categories file")?;
        vocabulary.merge_json(&value);
    }

    Ok(vocabulary)
}

/// Ingest one document for a tenant.
pub async fn ingest_document(
    config: &Config,
    vocabulary: &CategoryVocabulary,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    tenant_id: &str,
    title: Option<&str>,
    raw_text: &str,
) -> Result<IngestOutcome> {
    let word_count = raw_text.split_whitespace().count();

    let mut normalized = false;
    let text = if config.ingest.normalize {
        match crate::normalize::normalize_document(
            raw_text,
            vocabulary,
            config.retrieval.category_confidence,
        ) {
            Some(block) => {
                normalized = true;
                format!("{block}\n\n{raw_text}")
            }
            None => raw_text.to_string(),
        }
    } else {
        raw_text.to_string()
    };

    let chunks = chunk_text(
        &text,
        config.chunking.target_words,
        config.chunking.overlap_words,
    );
    if chunks.is_empty() {
        bail!("document produced no usable chunks");
    }

    let vectors = embedder
        .embed_passages(&chunks)
        .await
        .context("failed to embed document chunks")?;

    let document_id = Uuid::new_v4().to_string();
    let passages: Vec<Passage> = chunks
        .iter()
        .zip(vectors.into_iter())
        .enumerate()
        .map(|(index, (content, embedding))| {
            let mut hasher = Sha256::new();
            hasher.update(content.as_bytes());
            let content_hash = format!("{:x}", hasher.finalize());

            Passage {
                id: Uuid::new_v4().to_string(),
                tenant_id: tenant_id.to_string(),
                document_id: document_id.clone(),
                chunk_index: index as i64,
                content: content.clone(),
                embedding,
                metadata: serde_json::json!({
                    "title": title,
                    "content_hash": content_hash,
                }),
            }
        })
        .collect();

    store
        .insert_passages(&passages)
        .await
        .context("failed to store passages")?;

    info!(
        tenant_id,
        document_id,
        chunks = passages.len(),
        word_count,
        normalized,
        "ingested document"
    );

    Ok(IngestOutcome {
        document_id,
        chunk_count: passages.len(),
        word_count,
        normalized,
    })
}
