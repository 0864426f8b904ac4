//! Text generation providers.
//!
//! Generation is always best-effort: summaries, answers, and clause
//! titles have deterministic fallbacks, so callers go through
//! [`generate_best_effort`], which tries each configured model in order
//! and returns `None` instead of an error.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::retry::{classify_status, classify_transport, RetryPolicy, ServiceError};

/// Produces text from a prompt with a named model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Models to try, in order.
    fn models(&self) -> &[String];
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ServiceError>;
}

/// Try every model in order and return the first non-empty answer.
///
/// Transient failures are retried per model under `policy`. Any other
/// outcome moves on to the next model.
pub async fn generate_best_effort(
    generator: &dyn TextGenerator,
    policy: &RetryPolicy,
    prompt: &str,
) -> Option<String> {
    for model in generator.models() {
        match policy
            .run("generation", || generator.generate(model, prompt))
            .await
        {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
                tracing::debug!(%model, "generator returned empty text");
            }
            Err(err) => {
                tracing::warn!(%model, error = %err, "generation attempt failed");
            }
        }
    }
    None
}

/// Generator used when `generation.provider = "disabled"`.
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    fn models(&self) -> &[String] {
        &[]
    }
    async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, ServiceError> {
        Err(ServiceError::Permanent(
            "Generation provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI Chat Completions ============

pub struct OpenAIGenerator {
    models: Vec<String>,
    url: String,
    api_key: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!("{} environment variable not set", config.api_key_env)
        })?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            models: config.models.clone(),
            url: url.trim_end_matches('/').to_string(),
            api_key,
            temperature: config.temperature,
            client,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    fn models(&self) -> &[String] {
        &self.models
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ServiceError> {
        let body = ChatRequest {
            model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport("OpenAI", &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(classify_status("OpenAI", status, &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| classify_transport("OpenAI", &e))?;
        Ok(parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    models: Vec<String>,
    url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            models: config.models.clone(),
            url: url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn models(&self) -> &[String] {
        &self.models
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ServiceError> {
        let body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ServiceError::Transient(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status("Ollama", status, &text));
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| classify_transport("Ollama", &e))?;
        Ok(parsed.response)
    }
}

/// Create the configured [`TextGenerator`].
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
