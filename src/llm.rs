//! LLM chat backends for answer synthesis.
//!
//! A [`ChatBackend`] takes a system prompt and a user prompt and returns
//! generated text. The variant is selected by configuration; `disabled`
//! always fails, which routes synthesis onto the deterministic template
//! path. Backend failure is never fatal for a request.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use answer_harness_core::error::HarnessError;

use crate::config::LlmConfig;

/// A text-generation backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Backend identifier, for logs.
    fn name(&self) -> &str;

    /// Generate a completion for the given system and user prompts.
    async fn generate(&self, system: &str, user: &str) -> Result<String, HarnessError>;
}

/// Create the configured [`ChatBackend`].
pub fn create_backend(config: &LlmConfig) -> Result<Arc<dyn ChatBackend>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledChat)),
        "ollama" => Ok(Arc::new(OllamaChat::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

/// A backend that always fails, forcing template synthesis.
pub struct DisabledChat;

#[async_trait]
impl ChatBackend for DisabledChat {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _system: &str, _user: &str) -> Result<String, HarnessError> {
        Err(HarnessError::Llm("llm backend is disabled".into()))
    }
}

/// Chat backend using a local Ollama instance's `/api/chat` endpoint.
pub struct OllamaChat {
    model: String,
    url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for Ollama provider"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            temperature: config.temperature,
            client,
        })
    }
}

fn llm_err(msg: impl Into<String>) -> HarnessError {
    HarnessError::Llm(msg.into())
}

#[async_trait]
impl ChatBackend for OllamaChat {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String, HarnessError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                llm_err(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(llm_err(format!("Ollama API error {}: {}", status, body_text)));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| llm_err(e.to_string()))?;
        let content = json
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| llm_err("invalid Ollama response: missing message content"))?;

        if content.trim().is_empty() {
            return Err(llm_err("Ollama returned an empty completion"));
        }

        Ok(content.to_string())
    }
}
