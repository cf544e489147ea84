//! HTTP client for an Ollama-style chat-completion endpoint.

use crate::config::GenerationConfig;
use crate::error::{AssistantError, Result};
use crate::services::TextGenerator;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Text generator backed by an HTTP `/api/chat` endpoint.
///
/// The request asks for JSON-constrained output, but the returned content
/// carries no guarantee of being valid — validation is the responder's job.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    chat_url: String,
    model: String,
    temperature: f32,
}

impl HttpTextGenerator {
    /// Build a generator from config. One long-lived client, reused across
    /// turns.
    pub fn new(config: &GenerationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_s))
            .build()
            .unwrap_or_default();
        Self {
            client,
            chat_url: format!("{}/api/chat", config.server_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
            "format": "json",
            "options": { "temperature": self.temperature },
        });

        let response = self
            .client
            .post(&self.chat_url)
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AssistantError::Generation(format!("generation request failed: {e}")))?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Generation(format!("malformed chat response: {e}")))?;

        Ok(parsed.message.content)
    }
}
