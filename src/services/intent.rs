//! HTTP client for a Rasa-style intent classification endpoint.

use crate::config::IntentConfig;
use crate::services::IntentClassifier;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Label returned for classifications below the confidence threshold.
/// It is outside the control-intent set, so the router treats it as
/// non-control.
pub const FALLBACK_INTENT: &str = "nlu_fallback";

#[derive(Debug, Deserialize)]
struct ParseResponse {
    #[serde(default)]
    intent: Option<ParsedIntent>,
}

#[derive(Debug, Deserialize)]
struct ParsedIntent {
    name: String,
    #[serde(default)]
    confidence: f64,
}

/// Intent classifier backed by an HTTP `/model/parse` endpoint.
pub struct HttpIntentClassifier {
    client: reqwest::Client,
    parse_url: String,
    confidence_threshold: f64,
}

impl HttpIntentClassifier {
    /// Build a classifier from config. The client and its timeout are fixed
    /// at construction and reused across turns.
    pub fn new(config: &IntentConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_s))
            .build()
            .unwrap_or_default();
        Self {
            client,
            parse_url: format!("{}/model/parse", config.server_url.trim_end_matches('/')),
            confidence_threshold: config.confidence_threshold,
        }
    }
}

#[async_trait]
impl IntentClassifier for HttpIntentClassifier {
    async fn classify(&self, text: &str) -> Option<String> {
        let result = self
            .client
            .post(&self.parse_url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await;

        let response = match result.and_then(|r| r.error_for_status()) {
            Ok(response) => response,
            Err(e) => {
                warn!("intent service unreachable, degrading to non-control: {e}");
                return None;
            }
        };

        let parsed: ParseResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("malformed intent service response: {e}");
                return None;
            }
        };

        let intent = parsed.intent?;
        if intent.confidence < self.confidence_threshold {
            debug!(
                intent = %intent.name,
                confidence = intent.confidence,
                "low-confidence classification, using fallback label"
            );
            return Some(FALLBACK_INTENT.to_owned());
        }
        Some(intent.name)
    }
}
