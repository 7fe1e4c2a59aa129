//! LLM Client
//!
//! Chat-completion client for OpenAI-compatible endpoints.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use intake_utils::{IntakeError, IntakeResult, LlmConfig};

const SERVICE: &str = "LLM API";

/// Sends one prompt and returns the model's raw reply text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> IntakeResult<String>;
}

/// Client for `POST {api_url}/chat/completions`.
pub struct OpenAiClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    system_prompt: String,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> IntakeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| IntakeError::internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            system_prompt: config.system_prompt.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> IntakeResult<String> {
        let url = format!("{}/chat/completions", self.api_url);
        debug!(model = %self.model, prompt_chars = prompt.len(), "calling chat completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(IntakeError::external_service(
                SERVICE,
                format!("{}: {}", status, error_text),
            ));
        }

        let result: ChatResponse = response.json().await?;
        first_choice(result)
    }
}

fn first_choice(response: ChatResponse) -> IntakeResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| IntakeError::external_service(SERVICE, "response contained no choices"))
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
