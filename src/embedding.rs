//! Embedding provider backends.
//!
//! Implements the core [`Embedder`] trait for the configured backend:
//!
//! - **`disabled`** — returns errors; used when embeddings are not configured.
//! - **`openai`** — calls the OpenAI embeddings API with batching, retry, and backoff.
//! - **`ollama`** — calls a local Ollama instance's `/api/embed` endpoint.
//! - **`local`** — in-process fastembed inference behind the
//!   `local-embeddings` feature, lazily initialized once per process and run
//!   under `spawn_blocking` so request tasks never stall on model inference.
//!
//! Every returned vector is L2-normalized before it leaves this module, so
//! ingestion-time and query-time vectors agree on the distance metric.
//!
//! # Retry Strategy
//!
//! Remote providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use answer_harness_core::embedding::{l2_normalize, Embedder};
use answer_harness_core::error::HarnessError;

use crate::config::EmbeddingConfig;

/// Create the configured [`Embedder`].
///
/// # Errors
///
/// Returns an error for unknown provider names or when the provider cannot
/// be initialized (missing config, API key, or feature flag).
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(local::LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!(
            "Embedding provider 'local' requires the `local-embeddings` feature. \
             Rebuild with `--features local-embeddings` or use a remote provider."
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Disabled Provider ============

/// A no-op embedder that always returns errors.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_passages(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, HarnessError> {
        Err(HarnessError::Embedding(
            "embedding provider is disabled".into(),
        ))
    }
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, HarnessError> {
        Err(HarnessError::Embedding(
            "embedding provider is disabled".into(),
        ))
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

fn embed_err(msg: impl Into<String>) -> HarnessError {
    HarnessError::Embedding(msg.into())
}

/// Check vector shape and scale to unit length.
fn finish_vectors(
    mut vectors: Vec<Vec<f32>>,
    expected: usize,
    dims: usize,
) -> Result<Vec<Vec<f32>>, HarnessError> {
    if vectors.len() != expected {
        return Err(embed_err(format!(
            "backend returned {} vectors for {} inputs",
            vectors.len(),
            expected
        )));
    }
    for vec in &mut vectors {
        if vec.len() != dims {
            return Err(embed_err(format!(
                "backend returned {}-dim vector, expected {}",
                vec.len(),
                dims
            )));
        }
        l2_normalize(vec);
    }
    Ok(vectors)
}

// ============ OpenAI Provider ============

/// Embedding backend using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with the configured model. Requires the
/// `OPENAI_API_KEY` environment variable.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            batch_size: config.batch_size,
            max_retries: config.max_retries,
            api_key,
            client,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, HarnessError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value =
                            response.json().await.map_err(|e| embed_err(e.to_string()))?;
                        let vectors = parse_openai_response(&json)?;
                        return finish_vectors(vectors, texts.len(), self.dims);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(embed_err(format!(
                            "OpenAI API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    return Err(embed_err(format!(
                        "OpenAI API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(embed_err(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| embed_err("embedding failed after retries")))
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, HarnessError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| embed_err("invalid OpenAI response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| embed_err("invalid OpenAI response: missing embedding"))?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }
    Ok(embeddings)
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, HarnessError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, HarnessError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| embed_err("empty embedding response"))
    }
}

// ============ Ollama Provider ============

/// Embedding backend using a local Ollama instance.
///
/// Calls `POST {url}/api/embed` (default `http://localhost:11434`). Requires
/// Ollama to be running with an embedding model pulled.
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            batch_size: config.batch_size,
            max_retries: config.max_retries,
            client,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, HarnessError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value =
                            response.json().await.map_err(|e| embed_err(e.to_string()))?;
                        let vectors = parse_ollama_response(&json)?;
                        return finish_vectors(vectors, texts.len(), self.dims);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(embed_err(format!(
                            "Ollama API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    return Err(embed_err(format!(
                        "Ollama API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(embed_err(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url, e
                    )));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| embed_err("embedding failed after retries")))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, HarnessError> {
    let data = json
        .get("embeddings")
        .and_then(|d| d.as_array())
        .ok_or_else(|| embed_err("invalid Ollama response: missing embeddings array"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .as_array()
            .ok_or_else(|| embed_err("invalid Ollama response: embedding is not an array"))?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }
    Ok(embeddings)
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, HarnessError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, HarnessError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| embed_err("empty embedding response"))
    }
}

// ============ Local Provider (fastembed) ============

#[cfg(feature = "local-embeddings")]
mod local {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::OnceCell;

    /// In-process embedding via fastembed.
    ///
    /// The model loads lazily on first use and is shared for the process
    /// lifetime; the first caller wins the initialization race and later
    /// callers reuse the loaded model. Inference runs on the blocking pool.
    pub struct LocalEmbedder {
        model_name: String,
        dims: usize,
        batch_size: usize,
        cell: OnceCell<Arc<Mutex<fastembed::TextEmbedding>>>,
    }

    impl LocalEmbedder {
        pub fn new(config: &EmbeddingConfig) -> Result<Self> {
            let model_name = config
                .model
                .clone()
                .unwrap_or_else(|| "bge-base-en-v1.5".to_string());
            let dims = config
                .dims
                .ok_or_else(|| anyhow::anyhow!("embedding.dims required for local provider"))?;

            // Fail fast on unknown model names.
            config_to_fastembed_model(&model_name)?;

            Ok(Self {
                model_name,
                dims,
                batch_size: config.batch_size,
                cell: OnceCell::new(),
            })
        }

        async fn model(&self) -> Result<Arc<Mutex<fastembed::TextEmbedding>>, HarnessError> {
            self.cell
                .get_or_try_init(|| async {
                    let name = self.model_name.clone();
                    tokio::task::spawn_blocking(move || {
                        let model = config_to_fastembed_model(&name)
                            .map_err(|e| embed_err(e.to_string()))?;
                        let embedding = fastembed::TextEmbedding::try_new(
                            fastembed::InitOptions::new(model),
                        )
                        .map_err(|e| {
                            embed_err(format!("failed to initialize local embedding model: {e}"))
                        })?;
                        Ok(Arc::new(Mutex::new(embedding)))
                    })
                    .await
                    .map_err(|e| embed_err(e.to_string()))?
                })
                .await
                .cloned()
        }

        async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, HarnessError> {
            let expected = texts.len();
            let model = self.model().await?;
            let batch_size = self.batch_size;

            let vectors = tokio::task::spawn_blocking(move || {
                let mut guard = model
                    .lock()
                    .map_err(|_| embed_err("local embedding model lock poisoned"))?;
                guard
                    .embed(texts, Some(batch_size))
                    .map_err(|e| embed_err(format!("local embedding failed: {e}")))
            })
            .await
            .map_err(|e| embed_err(e.to_string()))??;

            finish_vectors(vectors, expected, self.dims)
        }
    }

    fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
        match name {
            "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
            "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
            other => bail!(
                "Unknown local embedding model: '{}'. Supported models: \
                 all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
                 bge-large-en-v1.5, nomic-embed-text-v1.5",
                other
            ),
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        fn model_name(&self) -> &str {
            &self.model_name
        }
        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, HarnessError> {
            self.embed_texts(texts.to_vec()).await
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, HarnessError> {
            let mut vectors = self.embed_texts(vec![text.to_string()]).await?;
            vectors
                .pop()
                .ok_or_else(|| embed_err("empty embedding response"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;

    #[tokio::test]
    async fn disabled_embedder_always_errors() {
        let embedder = DisabledEmbedder;
        let err = embedder.embed_query("hello").await.unwrap_err();
        assert!(matches!(err, HarnessError::Embedding(_)));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = EmbeddingConfig {
            provider: "mystery".to_string(),
            ..Default::default()
        };
        assert!(create_embedder(&config).is_err());
    }

    #[test]
    fn finish_vectors_normalizes_and_checks_dims() {
        let vectors = vec![vec![3.0f32, 4.0]];
        let out = finish_vectors(vectors, 1, 2).unwrap();
        let norm: f32 = out[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);

        assert!(finish_vectors(vec![vec![1.0f32]], 1, 2).is_err());
        assert!(finish_vectors(vec![], 1, 2).is_err());
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(10), Duration::from_secs(32));
    }
}
