//! Tenant-scoped retrieval with adaptive broadening and fallback.
//!
//! The retriever embeds the question, runs a nearest-neighbor search scoped
//! to the tenant, and widens the net when the first pass comes back thin:
//!
//! 1. Category terms detected in the question (exact or fuzzy against the
//!    vocabulary) are appended to the query text before embedding, biasing
//!    retrieval toward passages tagged with those categories.
//! 2. If the result set holds little content and the query was broadened,
//!    category-specific synthetic queries are retried and merged.
//! 3. If results are still thin, the unmodified question is retried and the
//!    larger result set wins.
//!
//! An unreachable embedding backend degrades to an empty result so the
//! request can still answer "no information found"; a store failure is fatal
//! for the request and propagates.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::categories::CategoryVocabulary;
use crate::embedding::Embedder;
use crate::error::HarnessError;
use crate::store::VectorStore;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// Number of passages requested from the store.
    pub top_k: usize,
    /// Optional cosine-distance cutoff. `None` disables the filter and
    /// returns the raw top-k, which sparse corpora need.
    pub max_distance: Option<f32>,
    /// Combined character length below which a result set counts as sparse.
    pub min_content_chars: usize,
    /// Extra passages allowed past `top_k` after fallback widening.
    pub widen_margin: usize,
    /// Similarity threshold for fuzzy category detection.
    pub category_confidence: f64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_distance: None,
            min_content_chars: 200,
            widen_margin: 2,
            category_confidence: 0.7,
        }
    }
}

/// The retrieval engine: query embedding, tenant-scoped search, broadening,
/// and fallback policy.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    vocabulary: CategoryVocabulary,
    params: RetrievalParams,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        vocabulary: CategoryVocabulary,
        params: RetrievalParams,
    ) -> Self {
        Self {
            embedder,
            store,
            vocabulary,
            params,
        }
    }

    /// Retrieve the most relevant passage contents for `question` within
    /// `tenant_id`, at most `top_k + widen_margin` entries.
    pub async fn retrieve(
        &self,
        question: &str,
        tenant_id: &str,
    ) -> Result<Vec<String>, HarnessError> {
        let params = &self.params;

        let categories = self
            .vocabulary
            .detect(question, params.category_confidence);
        let broadened = if categories.is_empty() {
            question.to_string()
        } else {
            format!("{} {}", question, categories.join(" "))
        };
        let was_broadened = broadened != question;

        if was_broadened {
            debug!(?categories, "broadened retrieval query");
        }

        let query_vec = match self.embedder.embed_query(&broadened).await {
            Ok(vec) => vec,
            Err(err) => {
                warn!(error = %err, "query embedding failed; degrading to empty retrieval");
                return Ok(Vec::new());
            }
        };

        let hits = self
            .store
            .search(tenant_id, &query_vec, params.top_k, params.max_distance)
            .await?;
        let mut contents: Vec<String> = hits.into_iter().map(|h| h.content).collect();

        // Thin results from a broadened query: retry with category-specific
        // synthetic queries and merge.
        if total_chars(&contents) < params.min_content_chars && was_broadened {
            for category in &categories {
                let synthetic = format!("information about {category} for {question}");
                let vec = match self.embedder.embed_query(&synthetic).await {
                    Ok(vec) => vec,
                    Err(err) => {
                        warn!(error = %err, category = %category, "synthetic query embedding failed");
                        continue;
                    }
                };
                let extra = self
                    .store
                    .search(tenant_id, &vec, params.top_k, params.max_distance)
                    .await?;
                for hit in extra {
                    if !contents.contains(&hit.content) {
                        contents.push(hit.content);
                    }
                }
            }
            contents.truncate(params.top_k + params.widen_margin);
        }

        // Still thin: retry the unmodified question and keep whichever
        // result set carries more content.
        if total_chars(&contents) < params.min_content_chars && was_broadened {
            match self.embedder.embed_query(question).await {
                Ok(vec) => {
                    let raw_hits = self
                        .store
                        .search(tenant_id, &vec, params.top_k, params.max_distance)
                        .await?;
                    let raw_contents: Vec<String> =
                        raw_hits.into_iter().map(|h| h.content).collect();
                    if total_chars(&raw_contents) > total_chars(&contents) {
                        debug!("raw-query fallback produced more content");
                        contents = raw_contents;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "raw-query fallback embedding failed");
                }
            }
        }

        Ok(contents)
    }
}

fn total_chars(contents: &[String]) -> usize {
    contents.iter().map(|c| c.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Passage, PassageHit};
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;

    /// Deterministic embedder mapping keyword families onto basis vectors.
    struct MockEmbedder;

    fn direction(text: &str) -> Vec<f32> {
        let t = text.to_lowercase();
        if t.starts_with("information about") {
            vec![0.0, 0.0, 0.0, 1.0]
        } else if t.contains("housing") || t.contains("shelter") {
            vec![0.0, 1.0, 0.0, 0.0]
        } else if t.contains("food") || t.contains("pantry") {
            vec![1.0, 0.0, 0.0, 0.0]
        } else {
            vec![0.0, 0.0, 1.0, 0.0]
        }
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        fn model_name(&self) -> &str {
            "mock"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, HarnessError> {
            Ok(texts.iter().map(|t| direction(t)).collect())
        }
        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, HarnessError> {
            Ok(direction(text))
        }
    }

    /// Embedder whose backend is always down.
    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "down"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed_passages(&self, _: &[String]) -> Result<Vec<Vec<f32>>, HarnessError> {
            Err(HarnessError::Embedding("connection refused".into()))
        }
        async fn embed_query(&self, _: &str) -> Result<Vec<f32>, HarnessError> {
            Err(HarnessError::Embedding("connection refused".into()))
        }
    }

    /// Store whose backend is always down.
    struct FailingStore;

    #[async_trait]
    impl VectorStore for FailingStore {
        async fn insert_passages(&self, _: &[Passage]) -> Result<(), HarnessError> {
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

    fn passage(tenant: &str, content: &str, embedding: Vec<f32>) -> Passage {
        Passage {
            id: format!("{tenant}:{content}"),
            tenant_id: tenant.to_string(),
            document_id: "doc".to_string(),
            chunk_index: 0,
            content: content.to_string(),
            embedding,
            metadata: serde_json::json!({}),
        }
    }

    fn retriever(store: Arc<dyn VectorStore>, params: RetrievalParams) -> Retriever {
        Retriever::new(
            Arc::new(MockEmbedder),
            store,
            CategoryVocabulary::default(),
            params,
        )
    }

    #[tokio::test]
    async fn empty_corpus_returns_empty_not_error() {
        let store = Arc::new(InMemoryStore::new());
        let r = retriever(store, RetrievalParams::default());
        let contents = r.retrieve("anything?", "tenant-a").await.unwrap();
        assert!(contents.is_empty());
    }

    #[tokio::test]
    async fn never_returns_other_tenants_passages() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_passages(&[
                passage("a", "tenant a housing info", vec![0.0, 1.0, 0.0, 0.0]),
                passage("b", "tenant b housing info", vec![0.0, 1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        let r = retriever(store, RetrievalParams::default());
        let contents = r.retrieve("housing help", "a").await.unwrap();
        assert!(!contents.is_empty());
        assert!(contents.iter().all(|c| c.starts_with("tenant a")));
    }

    #[tokio::test]
    async fn category_broadening_biases_toward_tagged_passages() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_passages(&[
                passage(
                    "a",
                    "CATEGORIES: housing\nShelter beds are available nightly at the center.",
                    vec![0.0, 1.0, 0.0, 0.0],
                ),
                passage("a", "unrelated general notes", vec![0.0, 0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let params = RetrievalParams {
            top_k: 1,
            ..Default::default()
        };
        // "shelter" is a housing synonym, so the query embeds toward the
        // housing direction even though the word "housing" never appears.
        let r = retriever(store, params);
        let contents = r.retrieve("I was evicted, where can I sleep? shelter", "a").await.unwrap();
        assert!(contents[0].contains("Shelter beds"));
    }

    #[tokio::test]
    async fn embedding_outage_degrades_to_empty() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());
        let r = Retriever::new(
            Arc::new(FailingEmbedder),
            store,
            CategoryVocabulary::default(),
            RetrievalParams::default(),
        );
        let contents = r.retrieve("housing help", "a").await.unwrap();
        assert!(contents.is_empty());
    }

    #[tokio::test]
    async fn store_outage_is_fatal() {
        let r = Retriever::new(
            Arc::new(MockEmbedder),
            Arc::new(FailingStore),
            CategoryVocabulary::default(),
            RetrievalParams::default(),
        );
        let err = r.retrieve("anything", "a").await.unwrap_err();
        assert!(matches!(err, HarnessError::Store(_)));
    }

    #[tokio::test]
    async fn widening_merges_synthetic_query_results() {
        let store = Arc::new(InMemoryStore::new());
        // The only passage sits in the synthetic-query direction, so the
        // broadened first pass finds nothing close and widening must run.
        store
            .insert_passages(&[passage(
                "a",
                "Housing navigation appointments available weekdays.",
                vec![0.0, 0.0, 0.0, 1.0],
            )])
            .await
            .unwrap();

        let params = RetrievalParams {
            top_k: 2,
            min_content_chars: 1000,
            ..Default::default()
        };
        let r = retriever(store, params);
        let contents = r.retrieve("help with housing", "a").await.unwrap();
        assert!(contents
            .iter()
            .any(|c| c.contains("Housing navigation appointments")));
    }

    #[tokio::test]
    async fn widened_results_are_deduplicated_and_capped() {
        let store = Arc::new(InMemoryStore::new());
        let mut passages = vec![passage(
            "a",
            "shared passage",
            vec![0.0, 1.0, 0.0, 0.0],
        )];
        for i in 0..10 {
            passages.push(passage(
                "a",
                &format!("synthetic passage {i}"),
                vec![0.0, 0.0, 0.0, 1.0],
            ));
        }
        store.insert_passages(&passages).await.unwrap();

        let params = RetrievalParams {
            top_k: 3,
            widen_margin: 2,
            min_content_chars: 10_000,
            ..Default::default()
        };
        let r = retriever(store, params.clone());
        let contents = r.retrieve("help with housing", "a").await.unwrap();
        assert!(contents.len() <= params.top_k + params.widen_margin);
        let unique: std::collections::HashSet<&String> = contents.iter().collect();
        assert_eq!(unique.len(), contents.len());
    }

    #[tokio::test]
    async fn raw_query_fallback_keeps_larger_result_set() {
        let store = Arc::new(InMemoryStore::new());
        // Raw question embeds to the "other" direction where a long passage
        // lives; the broadened/synthetic directions only hold a short one.
        store
            .insert_passages(&[
                passage("a", "tiny", vec![0.0, 1.0, 0.0, 0.0]),
                passage(
                    "a",
                    &"long passage content ".repeat(20),
                    vec![0.0, 0.0, 1.0, 0.0],
                ),
            ])
            .await
            .unwrap();

        let params = RetrievalParams {
            top_k: 1,
            min_content_chars: 10_000,
            ..Default::default()
        };
        let r = retriever(store, params);
        // "evicted" fuzzy-matches the housing synonym "eviction", so the
        // broadened query leans housing while the raw query does not.
        let contents = r.retrieve("I was evicted", "a").await.unwrap();
        assert!(contents.iter().any(|c| c.contains("long passage content")));
    }
}
