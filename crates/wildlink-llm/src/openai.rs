//! OpenAI chat-completions narrative generator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::generator::{clean_narrative, GeneratorError, GeneratorResult, NarrativeGenerator};
use crate::prompts::SYSTEM_PROMPT;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for the OpenAI API.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl OpenAiConfig {
    /// Config with default endpoint and sampling parameters.
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    /// Read `WILDLINK_OPENAI_API_KEY` (or `OPENAI_API_KEY`) and the optional
    /// `WILDLINK_OPENAI_BASE_URL`.
    pub fn from_env() -> GeneratorResult<Self> {
        let api_key = std::env::var("WILDLINK_OPENAI_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| GeneratorError::NotConfigured("OpenAI API key is not set".into()))?;

        let mut config = Self::new(&api_key);
        if let Ok(base_url) = std::env::var("WILDLINK_OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }

    /// Override the API root (proxies, test servers).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }
}

/// Blocking OpenAI client.
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> GeneratorResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GeneratorError::NotConfigured(
                "OpenAI API key is not configured".into(),
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| GeneratorError::Http(e.to_string()))?;

        Ok(Self {
            config: OpenAiConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            client,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn build_request<'a>(config: &OpenAiConfig, model: &'a str, prompt: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ],
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

/// Extract the narrative from a successful response body.
fn parse_chat_response(body: &str) -> GeneratorResult<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GeneratorError::InvalidResponse(e.to_string()))?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| GeneratorError::InvalidResponse("No choices in response".into()))?;
    clean_narrative(&content)
}

/// Build an API error from a non-success response.
fn parse_api_error(status: u16, body: &str) -> GeneratorError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string());
    GeneratorError::Api { status, message }
}

impl NarrativeGenerator for OpenAiClient {
    fn generate(&self, prompt: &str, model: &str, timeout: Duration) -> GeneratorResult<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = build_request(&self.config, model, prompt);

        tracing::debug!(model, prompt_len = prompt.len(), "Requesting narrative");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Timeout(timeout.as_secs())
                } else {
                    GeneratorError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| GeneratorError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(parse_api_error(status.as_u16(), &text));
        }

        parse_chat_response(&text)
    }
}
