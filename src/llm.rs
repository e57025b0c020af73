use crate::config::CompletionConfig;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of one completion call
pub type CompletionResult = std::result::Result<String, CompletionError>;

/// Why a completion produced no reply
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Connection, DNS, TLS or read failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx status or a body that is not a chat completion
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Well-formed response without a usable candidate
    #[error("response contained no usable completion")]
    EmptyCompletion,
}

/// Message in the request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<LlmMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// Error bodies can be large HTML pages.
const MAX_LOGGED_BODY: usize = 512;

/// Client for a single chat-completion endpoint
#[derive(Clone)]
pub struct CompletionClient {
    config: CompletionConfig,
    client: reqwest::Client,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send `prompt` as the only user turn and return the first candidate.
    pub async fn complete(&self, prompt: &str) -> CompletionResult {
        let result = self.request(prompt).await;
        match &result {
            Ok(reply) => tracing::info!(
                model = %self.config.model,
                reply_chars = reply.chars().count(),
                "completion succeeded"
            ),
            Err(e) => tracing::warn!(
                model = %self.config.model,
                endpoint = %self.config.endpoint,
                error = %e,
                "completion failed"
            ),
        }
        result
    }

    async fn request(&self, prompt: &str) -> CompletionResult {
        let payload = CompletionRequest {
            model: &self.config.model,
            messages: vec![LlmMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.config.max_tokens,
        };

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .json(&payload);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        tracing::debug!(endpoint = %self.config.endpoint, "sending completion request");
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CompletionError::Protocol(format!(
                "endpoint returned {}: {}",
                status,
                truncate(&body)
            )));
        }

        parse_reply(status, &body)
    }
}

fn parse_reply(status: StatusCode, body: &str) -> CompletionResult {
    let parsed: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        let detail = truncate(body);
        CompletionError::Protocol(format!("malformed {} body ({}): {}", status, e, detail))
    })?;

    // A blank candidate is still a reply; only a missing one is an error
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or(CompletionError::EmptyCompletion)
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_LOGGED_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
