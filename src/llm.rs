//! LLM completion backend.
//!
//! [`ChatModel`] is the narrow contract the answer generator depends on:
//! a list of role-tagged messages in, generated text out. The production
//! implementation talks to any OpenAI-compatible chat-completions API
//! (Groq by default, matching the models this assistant was tuned
//! against). Connectivity failures surface as
//! [`Error::ServiceUnavailable`]; the core never retries.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{from_reqwest, Error, Result};

/// A role-tagged message sent to the completion backend.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Text-generation backend used by the answer generator.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Client for OpenAI-compatible `POST /chat/completions` endpoints.
pub struct OpenAiCompatChat {
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatChat {
    /// Build the client from configuration. The API key is read from the
    /// environment variable named in `llm.api_key_env`; a missing key is
    /// a configuration error, caught at startup rather than mid-request.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            Error::Config(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(e.into()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| from_reqwest("chat completion", e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(Error::ServiceUnavailable(format!(
                    "chat completion error {}: {}",
                    status, body_text
                )));
            }
            return Err(Error::Internal(anyhow::anyhow!(
                "chat completion error {}: {}",
                status,
                body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Internal(e.into()))?;
        parse_completion(&json)
    }
}

fn parse_completion(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            Error::Internal(anyhow::anyhow!(
                "Invalid chat completion response: missing choices[0].message.content"
            ))
        })
}
