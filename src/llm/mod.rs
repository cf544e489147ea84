//! Generate-and-validate-with-retry layer over the text-generation service.
//!
//! The generation service is non-deterministic; transient malformed output
//! is expected, not exceptional. The responder retries a bounded number of
//! times and falls back to a fixed reply instead of surfacing an error.

pub mod prompt;

pub use prompt::ConversationMemory;

use crate::config::GenerationConfig;
use crate::services::TextGenerator;
use crate::tasks::{ActionKind, ActionRequest};
use prompt::build_prompt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed fail-soft reply returned when every attempt was exhausted.
pub const FALLBACK_RESPONSE: &str = "Sorry, I could not process the request.";

/// Literal marker that must appear in raw output before parsing is even
/// attempted. A cheap pre-filter against truncated output.
const TOOL_CALLS_MARKER: &str = "tool_calls";

/// Validated structured reply from the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedReply {
    /// Text for the user.
    pub response: String,
    /// Structured task operations, possibly empty.
    #[serde(default)]
    pub tool_calls: Vec<ActionRequest>,
}

impl GeneratedReply {
    /// The fixed fallback reply.
    pub fn fallback() -> Self {
        Self {
            response: FALLBACK_RESPONSE.to_owned(),
            tool_calls: Vec::new(),
        }
    }
}

/// Drives the generation service and guarantees a schema-valid reply.
pub struct Responder {
    generator: Arc<dyn TextGenerator>,
    memory: ConversationMemory,
    max_attempts: u32,
    request_timeout: Duration,
}

impl Responder {
    /// Wrap a generation service handle. The handle is constructed once at
    /// startup and reused for every turn.
    pub fn new(generator: Arc<dyn TextGenerator>, config: &GenerationConfig) -> Self {
        Self {
            generator,
            memory: ConversationMemory::new(config.history_max_chars),
            max_attempts: config.max_attempts.max(1),
            request_timeout: Duration::from_secs(config.request_timeout_s),
        }
    }

    /// Generate a validated reply for one utterance.
    ///
    /// Retries the same prompt on malformed output, up to the configured
    /// bound; a per-call timeout counts as a failed attempt. Never fails:
    /// exhaustion yields the fixed fallback reply.
    pub async fn generate(
        &mut self,
        user_message: &str,
        context_json: &str,
        emotion: &str,
    ) -> GeneratedReply {
        let today = chrono::Local::now().date_naive();
        let prompt = build_prompt(user_message, context_json, emotion, &self.memory, today);

        for attempt in 1..=self.max_attempts {
            let raw = match tokio::time::timeout(
                self.request_timeout,
                self.generator.generate(&prompt),
            )
            .await
            {
                Ok(Ok(raw)) => raw,
                Ok(Err(e)) => {
                    warn!(attempt, "generation call failed: {e}");
                    continue;
                }
                Err(_) => {
                    warn!(attempt, "generation call timed out");
                    continue;
                }
            };

            if !raw.contains(TOOL_CALLS_MARKER) {
                warn!(attempt, "output lacks the tool_calls marker, retrying");
                continue;
            }

            match validate(&raw) {
                Some(reply) => {
                    debug!(attempt, actions = reply.tool_calls.len(), "validated reply");
                    return reply;
                }
                None => {
                    warn!(attempt, "output failed schema validation, retrying");
                }
            }
        }

        warn!("all generation attempts exhausted, returning fallback reply");
        GeneratedReply::fallback()
    }

    /// Record one completed turn in conversation memory.
    pub fn record_turn(&mut self, user: &str, assistant: &str) {
        self.memory.record_turn(user, assistant);
    }

    /// Clear conversation memory (the restart control intent).
    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }
}

/// Parse and schema-check a candidate reply.
///
/// Unknown action verbs are rejected here so a retry can fix them; a missing
/// `task` on a mutating action is NOT rejected — the engine skips that item
/// per-request instead of discarding the whole reply.
fn validate(raw: &str) -> Option<GeneratedReply> {
    let reply: GeneratedReply = match serde_json::from_str(raw) {
        Ok(reply) => reply,
        Err(e) => {
            warn!("reply is not valid JSON: {e}");
            return None;
        }
    };
    if reply
        .tool_calls
        .iter()
        .any(|call| call.action == ActionKind::Unknown)
    {
        warn!("reply contains an unknown action verb");
        return None;
    }
    Some(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Generator that replays a fixed script of outputs and records every
    /// prompt it was given.
    struct ScriptedGenerator {
        script: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(outputs: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(outputs.iter().rev().map(|s| (*s).to_owned()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompt_count(&self) -> usize {
            self.prompts.lock().expect("lock prompts").len()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().expect("lock prompts").push(prompt.to_owned());
            Ok(self
                .script
                .lock()
                .expect("lock script")
                .pop()
                .unwrap_or_else(|| "not json at all".to_owned()))
        }
    }

    fn responder(generator: Arc<ScriptedGenerator>) -> Responder {
        Responder::new(generator, &GenerationConfig::default())
    }

    const VALID: &str =
        r#"{"response": "Added it.", "tool_calls": [{"action": "add", "task": "comprar pan"}]}"#;

    #[tokio::test]
    async fn first_valid_output_is_returned() {
        let generator = ScriptedGenerator::new(&[VALID]);
        let mut responder = responder(Arc::clone(&generator));

        let reply = responder.generate("añade comprar pan", "{}", "neutral").await;
        assert_eq!(reply.response, "Added it.");
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(generator.prompt_count(), 1);
    }

    #[tokio::test]
    async fn malformed_output_is_retried_until_valid() {
        let generator = ScriptedGenerator::new(&[
            "truncated gibberish",                       // no marker
            r#"{"tool_calls": [nope"#,                   // marker but not JSON
            VALID,
        ]);
        let mut responder = responder(Arc::clone(&generator));

        let reply = responder.generate("añade comprar pan", "{}", "neutral").await;
        assert_eq!(reply.response, "Added it.");
        assert_eq!(generator.prompt_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_attempts_yield_exactly_the_fallback() {
        let generator = ScriptedGenerator::new(&["bad", "bad", "bad"]);
        let mut responder = responder(Arc::clone(&generator));

        let reply = responder.generate("hola", "{}", "neutral").await;
        assert_eq!(reply.response, FALLBACK_RESPONSE);
        assert!(reply.tool_calls.is_empty());
        assert_eq!(generator.prompt_count(), 3);
    }

    #[tokio::test]
    async fn unknown_action_verb_fails_validation() {
        let unknown =
            r#"{"response": "hm", "tool_calls": [{"action": "defenestrate", "task": "x"}]}"#;
        let generator = ScriptedGenerator::new(&[unknown, VALID]);
        let mut responder = responder(Arc::clone(&generator));

        let reply = responder.generate("hola", "{}", "neutral").await;
        assert_eq!(reply.response, "Added it.");
        assert_eq!(generator.prompt_count(), 2);
    }

    #[tokio::test]
    async fn missing_task_on_mutating_action_still_validates() {
        // Left for the engine to reject per-item.
        let missing_task = r#"{"response": "ok", "tool_calls": [{"action": "remove"}]}"#;
        let generator = ScriptedGenerator::new(&[missing_task]);
        let mut responder = responder(Arc::clone(&generator));

        let reply = responder.generate("quita algo", "{}", "neutral").await;
        assert_eq!(reply.response, "ok");
        assert_eq!(reply.tool_calls.len(), 1);
    }

    #[tokio::test]
    async fn restart_clears_the_transcript_from_later_prompts() {
        let generator = ScriptedGenerator::new(&[VALID, VALID]);
        let mut responder = responder(Arc::clone(&generator));

        let reply = responder.generate("añade comprar pan", "{}", "neutral").await;
        responder.record_turn("añade comprar pan", &reply.response);
        responder.clear_memory();

        responder.generate("hola otra vez", "{}", "neutral").await;
        let prompts = generator.prompts.lock().expect("lock prompts");
        assert!(!prompts[1].contains("añade comprar pan\nAssistant"));
    }
}
