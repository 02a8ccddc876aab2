//! Text generation client
//!
//! Provides:
//! - The `TextGenerator` trait used for narratives and intent classification
//! - An OpenAI-compatible chat completions client
//! - A scripted mock for tests and offline development

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a fundraising analyst for an education nonprofit. Answer using only the figures provided.";

const CLASSIFY_SYSTEM_PROMPT: &str = "You classify questions. Respond with a single JSON object and nothing else.";

/// Options for a single generation call
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub max_tokens: usize,
    pub temperature: f32,
    /// System prompt override
    pub system_prompt: Option<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 800,
            temperature: 0.3,
            system_prompt: None,
        }
    }
}

impl GenerationOptions {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generation endpoint returned no content")]
    EmptyResponse,

    #[error("classification reply is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generator not configured: {0}")]
    NotConfigured(String),
}

/// Natural-language generation behind the narrative and classification steps
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate free text for a prompt
    async fn generate(&self, prompt: &str, options: &GenerationOptions)
        -> std::result::Result<String, LlmError>;

    /// Generate and parse a JSON object
    async fn classify(&self, prompt: &str) -> std::result::Result<serde_json::Value, LlmError> {
        let options = GenerationOptions {
            max_tokens: 200,
            temperature: 0.0,
            system_prompt: Some(CLASSIFY_SYSTEM_PROMPT.to_string()),
        };
        let reply = self.generate(prompt, &options).await?;
        parse_json_reply(&reply)
    }

    /// Model name for logging
    fn model_name(&self) -> &str;
}

/// Parse a JSON object out of a model reply, tolerating markdown code fences
pub fn parse_json_reply(reply: &str) -> std::result::Result<serde_json::Value, LlmError> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| LlmError::InvalidJson(e.to_string()))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(LlmError::InvalidJson("expected a JSON object".to_string()))
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any OpenAI-compatible chat completions endpoint
pub struct OpenAiCompatGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::ConfigurationMissing {
                key: "llm.api_key".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatGenerator {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> std::result::Result<String, LlmError> {
        let system = options
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Request(format!("unreadable response: {}", e)))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Scripted generator.
///
/// Replies are consumed in order; once the script is exhausted every call
/// gets a canned narrative echoing the start of the prompt.
#[derive(Default)]
pub struct MockGenerator {
    script: Mutex<VecDeque<std::result::Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    latency: Option<Duration>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push_reply(reply);
        self
    }

    pub fn with_failure(self, error: LlmError) -> Self {
        self.push_failure(error);
        self
    }

    /// Delay every call, to exercise timeouts
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(reply.into()));
        }
    }

    pub fn push_failure(&self, error: LlmError) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(error));
        }
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|prompts| prompts.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> std::result::Result<String, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self.script.lock().ok().and_then(|mut script| script.pop_front());
        match scripted {
            Some(reply) => reply,
            None => {
                let preview: String = prompt.chars().take(80).collect();
                Ok(format!("[mock narrative] {}", preview))
            }
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// Create the text generator named by `llm.provider`
pub fn create_text_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider.to_ascii_lowercase().as_str() {
        "mock" => Ok(Arc::new(MockGenerator::new())),
        "openai" | "openai_compatible" => Ok(Arc::new(OpenAiCompatGenerator::new(config)?)),
        other => Err(AppError::Configuration(::config::ConfigError::Message(
            format!("unknown llm provider '{}'", other),
        ))),
    }
}
