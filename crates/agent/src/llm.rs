use std::time::Duration;

use async_trait::async_trait;
use pricepromo_core::config::LlmConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

pub const REDACTED: &str = "<redacted>";
pub const PROBE_PROMPT: &str = "Hello, this is a test request!";
pub const PROBE_MAX_TOKENS: u32 = 50;
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// The short request `llm-check` sends to confirm the service is reachable.
    pub fn probe(model: impl Into<String>) -> Self {
        Self { model: model.into(), prompt: PROBE_PROMPT.to_string(), max_tokens: PROBE_MAX_TOKENS }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("service responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// Display text with every occurrence of `secret` replaced by [`REDACTED`].
    pub fn redacted(&self, secret: Option<&SecretString>) -> String {
        let message = self.to_string();
        match secret {
            Some(secret) => redact_secret(&message, secret.expose_secret()),
            None => message,
        }
    }
}

pub fn redact_secret(text: &str, secret: &str) -> String {
    let secret = secret.trim();
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, REDACTED)
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Chat-completions client for OpenAI-compatible services.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(api_key: SecretString, base_url: &str, timeout: Duration) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), api_key, timeout })
    }

    /// `Ok(None)` when no credential is configured.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>, LlmError> {
        let Some(api_key) = config.credential() else {
            return Ok(None);
        };
        Self::new(api_key.clone(), &config.base_url, Duration::from_secs(config.timeout_secs))
            .map(Some)
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = json!({
            "model": request.model,
            "messages": [{"role": "user", "content": request.prompt}],
            "max_tokens": request.max_tokens,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    LlmError::Timeout(self.timeout)
                } else {
                    LlmError::Transport(error.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_at_char_boundary(&mut body, ERROR_BODY_LIMIT);
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|error| LlmError::MalformedResponse(error.to_string()))?;
        extract_completion(&payload)
    }
}

/// Pulls `choices[0].message.content` out of a chat-completions payload, trimmed.
pub fn extract_completion(payload: &Value) -> Result<String, LlmError> {
    let content = payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            LlmError::MalformedResponse("missing choices[0].message.content".to_string())
        })?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(LlmError::MalformedResponse("completion text is empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn truncate_at_char_boundary(text: &mut String, limit: usize) {
    if text.len() <= limit {
        return;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}
