use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use answer_harness_core::retrieve::RetrievalParams;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/anh.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Fixed chunk size in words. Omit to size adaptively per document.
    #[serde(default)]
    pub target_words: Option<usize>,
    #[serde(default = "default_overlap_words")]
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_words: None,
            overlap_words: default_overlap_words(),
        }
    }
}

fn default_overlap_words() -> usize {
    answer_harness_core::chunk::DEFAULT_OVERLAP_WORDS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Optional cosine-distance cutoff for search results. Leave unset to
    /// return the raw top-k; sparse corpora return nothing useful under an
    /// aggressive threshold.
    #[serde(default)]
    pub max_distance: Option<f32>,
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    #[serde(default = "default_widen_margin")]
    pub widen_margin: usize,
    #[serde(default = "default_category_confidence")]
    pub category_confidence: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_distance: None,
            min_content_chars: default_min_content_chars(),
            widen_margin: default_widen_margin(),
            category_confidence: default_category_confidence(),
        }
    }
}

impl RetrievalConfig {
    pub fn to_params(&self) -> RetrievalParams {
        RetrievalParams {
            top_k: self.top_k,
            max_distance: self.max_distance,
            min_content_chars: self.min_content_chars,
            widen_margin: self.widen_margin,
            category_confidence: self.category_confidence,
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_min_content_chars() -> usize {
    200
}
fn default_widen_margin() -> usize {
    2
}
fn default_category_confidence() -> f64 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Backend base URL (Ollama). Defaults to the local daemon.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Assistant name used in the synthesis persona prompt.
    #[serde(default = "default_persona")]
    pub persona: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            url: None,
            temperature: default_temperature(),
            persona: default_persona(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_temperature() -> f32 {
    0.7
}
fn default_persona() -> String {
    "Clara".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Prepend a labeled CATEGORIES / CONTACT INFORMATION / DESCRIPTION
    /// block to documents before chunking.
    #[serde(default = "default_true")]
    pub normalize: bool,
    /// Optional JSON file of extra category synonyms merged into the
    /// built-in vocabulary.
    #[serde(default)]
    pub categories_path: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            categories_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.retrieval.category_confidence)
        || config.retrieval.category_confidence == 0.0
    {
        anyhow::bail!("retrieval.category_confidence must be in (0.0, 1.0]");
    }

    if let Some(max_distance) = config.retrieval.max_distance {
        if !(0.0..=2.0).contains(&max_distance) {
            anyhow::bail!("retrieval.max_distance must be in [0.0, 2.0]");
        }
    }

    if config.chunking.target_words == Some(0) {
        anyhow::bail!("chunking.target_words must be > 0 when set");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "disabled" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled or ollama.",
            other
        ),
    }

    if config.llm.is_enabled() && config.llm.model.is_none() {
        anyhow::bail!(
            "llm.model must be specified when provider is '{}'",
            config.llm.provider
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.retrieval.top_k, 4);
        assert!(config.retrieval.max_distance.is_none());
        assert_eq!(config.embedding.provider, "disabled");
        assert!(config.ingest.normalize);
    }

    #[test]
    fn enabled_embedding_requires_model_and_dims() {
        let config: Config = toml::from_str(
            r#"
            [embedding]
            provider = "ollama"
            "#,
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config: Config = toml::from_str(
            r#"
            [embedding]
            provider = "mystery"
            model = "m"
            dims = 4
            "#,
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn retrieval_config_maps_to_params() {
        let config: Config = toml::from_str(
            r#"
            [retrieval]
            top_k = 8
            max_distance = 0.5
            category_confidence = 0.65
            "#,
        )
        .unwrap();
        validate(&config).unwrap();
        let params = config.retrieval.to_params();
        assert_eq!(params.top_k, 8);
        assert_eq!(params.max_distance, Some(0.5));
        assert_eq!(params.category_confidence, 0.65);
    }
}
