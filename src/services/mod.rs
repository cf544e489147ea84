//! Narrow contracts for the external ML collaborators.
//!
//! The core never talks to a model directly; each service is abstracted to
//! one small trait, constructed once at startup and injected by handle. All
//! of them are allowed to fail, and every caller degrades to a safe default
//! instead of propagating the failure to the user.

pub mod console;
pub mod generation;
pub mod intent;

pub use generation::HttpTextGenerator;
pub use intent::HttpIntentClassifier;

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One recognized utterance from the speech front-end.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Transcribed text.
    pub text: String,
    /// Handle to the captured audio, when the front-end recorded one.
    /// Consumed by the emotion classifier.
    pub audio: Option<PathBuf>,
}

/// Speech front-end: blocks until speech is detected and transcribed.
#[async_trait]
pub trait SpeechInput: Send {
    /// Wait for the next utterance. `None` means the input source is
    /// exhausted and the run loop should stop.
    async fn listen(&mut self) -> Result<Option<Utterance>>;
}

/// Speech output: fire-and-forget, no return value consumed by the core.
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Render the text to the user.
    async fn speak(&self, text: &str);

    /// Play a short acknowledgement cue the given number of times.
    async fn cue(&self, _times: u32) {}
}

/// Emotion classification from a captured audio handle.
pub trait EmotionClassifier: Send + Sync {
    /// Classify the utterance audio; `"unknown"` when undeterminable.
    fn classify(&self, audio: Option<&Path>) -> String;
}

/// Intent classification service.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classify free text into an intent label. `None` means the service is
    /// unreachable — callers must degrade to non-control, never crash.
    async fn classify(&self, text: &str) -> Option<String>;
}

/// Text-generation service. May return malformed or schema-violating
/// output; validation and retries are the caller's concern.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate raw text for the prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Emotion classifier that reports a neutral reading for everything.
/// Used when no emotion model is wired in.
#[derive(Debug, Default)]
pub struct NullEmotionClassifier;

impl EmotionClassifier for NullEmotionClassifier {
    fn classify(&self, _audio: Option<&Path>) -> String {
        "neutral".to_owned()
    }
}
