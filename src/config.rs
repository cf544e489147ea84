//! Configuration types for the assistant.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Conversation lifecycle settings (wake phrase, timeouts).
    pub conversation: ConversationConfig,
    /// Text-generation service settings.
    pub generation: GenerationConfig,
    /// Intent classification service settings.
    pub intent: IntentConfig,
    /// Task store settings.
    pub store: StoreConfig,
}

/// Conversation lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Wake phrase that activates the assistant (case-insensitive,
    /// comma-tolerant).
    pub wake_phrase: String,
    /// Phrase that shuts the assistant down while dormant.
    pub shutdown_phrase: String,
    /// Default first turn forwarded when the wake phrase carries no
    /// trailing command.
    pub greeting: String,
    /// Seconds without activity before an active conversation returns to
    /// dormant.
    pub inactivity_timeout_s: u64,
    /// Seconds without activity before a paused conversation returns to
    /// dormant.
    pub pause_timeout_s: u64,
    /// Poll interval of the inactivity monitor in milliseconds.
    pub monitor_poll_ms: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            wake_phrase: "oye pato".to_owned(),
            shutdown_phrase: "apagar pato".to_owned(),
            greeting: "hola".to_owned(),
            inactivity_timeout_s: 60,
            pause_timeout_s: 120,
            monitor_poll_ms: 500,
        }
    }
}

/// Text-generation service configuration (Ollama-style chat endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of the generation server.
    pub server_url: String,
    /// Model name passed in the request payload.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum validation attempts before returning the fallback reply.
    pub max_attempts: u32,
    /// Per-call timeout in seconds.
    pub request_timeout_s: u64,
    /// Character budget for the running conversation history embedded in
    /// the prompt. Oldest turns are dropped first.
    pub history_max_chars: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:11434".to_owned(),
            model: "llama3.2:3b-instruct-q3_K_M".to_owned(),
            temperature: 0.2,
            max_attempts: 3,
            request_timeout_s: 30,
            history_max_chars: 4096,
        }
    }
}

/// Intent classification service configuration (Rasa-style parse endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// Base URL of the intent classification server.
    pub server_url: String,
    /// Classifications below this confidence are treated as non-control.
    pub confidence_threshold: f64,
    /// Per-call timeout in seconds.
    pub request_timeout_s: u64,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5005".to_owned(),
            confidence_threshold: 0.8,
            request_timeout_s: 10,
        }
    }
}

/// Task store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the pending and completed task files.
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("pato")
}

impl AssistantConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::AssistantError::Config(e.to_string()))
    }

    /// Load from the default path, or defaults when no file exists.
    pub fn load_or_default() -> Self {
        let path = Self::default_config_path();
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                if path.exists() {
                    tracing::warn!("ignoring unreadable config at {}: {e}", path.display());
                }
                Self::default()
            }
        }
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AssistantError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/pato/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("pato")
            .join("config.toml")
    }
}
