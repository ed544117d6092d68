//! Integration tests for the full question-answering pipeline.
//!
//! These drive ingestion → retrieval → synthesis → streaming against the
//! in-memory store with a deterministic mock embedder, suitable for CI.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;

use answer_harness::answer::Synthesizer;
use answer_harness::config::Config;
use answer_harness::ingest::ingest_document;
use answer_harness::llm::DisabledChat;
use answer_harness::stream::answer_stream;

use answer_harness_core::categories::CategoryVocabulary;
use answer_harness_core::embedding::{l2_normalize, Embedder};
use answer_harness_core::error::HarnessError;
use answer_harness_core::models::{PassageHit, StreamFrame};
use answer_harness_core::retrieve::{RetrievalParams, Retriever};
use answer_harness_core::store::memory::InMemoryStore;
use answer_harness_core::store::VectorStore;

/// Deterministic bag-of-words embedder: each word hashes into one of 16
/// buckets, so texts sharing vocabulary land near each other.
struct MockEmbedder;

fn embed_text(text: &str) -> Vec<f32> {
    let mut vec = vec![0.0f32; 16];
    for word in text.to_lowercase().split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if word.is_empty() {
            continue;
        }
        let mut hasher = DefaultHasher::new();
        word.hash(&mut hasher);
        vec[(hasher.finish() % 16) as usize] += 1.0;
    }
    l2_normalize(&mut vec);
    vec
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_name(&self) -> &str {
        "mock-bag-of-words"
    }
    fn dims(&self) -> usize {
        16
    }
    async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, HarnessError> {
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, HarnessError> {
        Ok(embed_text(text))
    }
}

const FOOD_BANK_DOC: &str = "Riverside Community Food Bank\n\
    We provide free groceries and hot meals to local families every weekday.\n\
    The pantry is open Monday through Friday from nine to five.\n\
    Call 555-123-4567 or email pantry@riverside.org with questions.\n\
    Visit https://riverside.org/pantry for directions and hours.";

const CLINIC_DOC: &str = "Harborview Walk-in Clinic\n\
    PROVIDER: Harborview Community Health\n\
    We offer walk-in medical care, dental checkups, and prescriptions.\n\
    No appointment is needed and sliding-scale fees are available.";

fn test_config() -> Config {
    Config::default()
}

async fn seeded_pipeline() -> (Arc<Retriever>, Arc<Synthesizer>, Arc<InMemoryStore>) {
    let config = test_config();
    let vocabulary = CategoryVocabulary::default();
    let store = Arc::new(InMemoryStore::new());
    let embedder = Arc::new(MockEmbedder);

    ingest_document(
        &config,
        &vocabulary,
        embedder.as_ref(),
        store.as_ref(),
        "tenant-a",
        Some("Food bank flyer"),
        FOOD_BANK_DOC,
    )
    .await
    .unwrap();

    ingest_document(
        &config,
        &vocabulary,
        embedder.as_ref(),
        store.as_ref(),
        "tenant-b",
        Some("Clinic flyer"),
        CLINIC_DOC,
    )
    .await
    .unwrap();

    let retriever = Arc::new(Retriever::new(
        embedder,
        store.clone(),
        CategoryVocabulary::default(),
        RetrievalParams::default(),
    ));
    let synthesizer = Arc::new(Synthesizer::new(Arc::new(DisabledChat), "Clara"));

    (retriever, synthesizer, store)
}

#[tokio::test]
async fn pipeline_answers_from_ingested_document() {
    let (retriever, synthesizer, _store) = seeded_pipeline().await;

    let passages = retriever
        .retrieve("where can I get free groceries?", "tenant-a")
        .await
        .unwrap();
    assert!(!passages.is_empty());

    let answer = synthesizer
        .synthesize("where can I get free groceries?", &passages)
        .await;

    // Normalization labeled the phone during ingestion; extraction finds it
    // back at query time.
    assert!(answer.text.contains("(555) 123-4567"));
    assert_eq!(answer.sources, passages);
    assert!(answer.structured.categories.contains(&"food".to_string()));
}

#[tokio::test]
async fn tenants_never_see_each_others_documents() {
    let (retriever, _synthesizer, _store) = seeded_pipeline().await;

    let passages = retriever
        .retrieve("walk-in medical care", "tenant-a")
        .await
        .unwrap();
    for passage in &passages {
        assert!(
            !passage.contains("Harborview"),
            "tenant-b content leaked into tenant-a retrieval"
        );
    }
}

#[tokio::test]
async fn empty_corpus_yields_no_information_answer() {
    let (retriever, synthesizer, _store) = seeded_pipeline().await;

    let passages = retriever
        .retrieve("anything at all", "tenant-with-no-documents")
        .await
        .unwrap();
    assert!(passages.is_empty());

    let answer = synthesizer.synthesize("anything at all", &passages).await;
    assert!(answer.text.contains("couldn't find any specific information"));
    assert!(answer.sources.is_empty());
}

#[tokio::test(start_paused = true)]
async fn streamed_chunks_concatenate_to_the_full_answer() {
    let (retriever, synthesizer, _store) = seeded_pipeline().await;
    let question = "I need help with food for my family";

    let passages = retriever.retrieve(question, "tenant-a").await.unwrap();
    let expected = synthesizer.synthesize(question, &passages).await;

    let frames = answer_stream(
        retriever,
        synthesizer,
        question.to_string(),
        "tenant-a".to_string(),
        "session-1".to_string(),
    );
    futures_util::pin_mut!(frames);

    let mut streamed = String::new();
    let mut complete: Option<StreamFrame> = None;

    while let Some(frame) = frames.next().await {
        match frame {
            StreamFrame::Chunk { content } => {
                assert!(complete.is_none(), "chunk arrived after the terminal frame");
                streamed.push_str(&content);
            }
            other => {
                assert!(complete.is_none(), "more than one terminal frame");
                complete = Some(other);
            }
        }
    }

    assert_eq!(streamed, expected.text);

    match complete.expect("stream ended without a terminal frame") {
        StreamFrame::Complete {
            session_id,
            sources,
            categories,
            ..
        } => {
            assert_eq!(session_id, "session-1");
            assert_eq!(sources, expected.sources);
            assert_eq!(categories, expected.structured.categories);
        }
        other => panic!("expected Complete terminal frame, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn store_outage_streams_a_single_error_frame() {
    struct DownStore;

    #[async_trait]
    impl VectorStore for DownStore {
        async fn insert_passages(
            &self,
            _: &[answer_harness_core::models::Passage],
        ) -> Result<(), HarnessError> {
            Err(HarnessError::Store("database unavailable".into()))
        }
        async fn search(
            &self,
            _: &str,
            _: &[f32],
            _: usize,
            _: Option<f32>,
        ) -> Result<Vec<PassageHit>, HarnessError> {
            Err(HarnessError::Store("database unavailable".into()))
        }
        async fn delete_document(&self, _: &str, _: &str) -> Result<usize, HarnessError> {
            Err(HarnessError::Store("database unavailable".into()))
        }
        async fn count(&self, _: &str) -> Result<usize, HarnessError> {
            Err(HarnessError::Store("database unavailable".into()))
        }
    }

    let retriever = Arc::new(Retriever::new(
        Arc::new(MockEmbedder),
        Arc::new(DownStore),
        CategoryVocabulary::default(),
        RetrievalParams::default(),
    ));
    let synthesizer = Arc::new(Synthesizer::new(Arc::new(DisabledChat), "Clara"));

    let frames = answer_stream(
        retriever,
        synthesizer,
        "question".to_string(),
        "tenant-a".to_string(),
        "session-1".to_string(),
    );
    futures_util::pin_mut!(frames);

    let collected: Vec<StreamFrame> = frames.collect().await;
    assert_eq!(collected.len(), 1);
    assert!(matches!(collected[0], StreamFrame::Error { .. }));
}

#[tokio::test]
async fn deleting_a_document_removes_its_passages() {
    let config = test_config();
    let vocabulary = CategoryVocabulary::default();
    let store = Arc::new(InMemoryStore::new());
    let embedder = MockEmbedder;

    let outcome = ingest_document(
        &config,
        &vocabulary,
        &embedder,
        store.as_ref(),
        "tenant-a",
        None,
        FOOD_BANK_DOC,
    )
    .await
    .unwrap();

    assert!(store.count("tenant-a").await.unwrap() > 0);
    let removed = store
        .delete_document("tenant-a", &outcome.document_id)
        .await
        .unwrap();
    assert_eq!(removed, outcome.chunk_count);
    assert_eq!(store.count("tenant-a").await.unwrap(), 0);
}
