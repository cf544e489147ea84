//! Conversation state machine and intent routing.
//!
//! States: dormant → active → (paused) → dormant. While dormant only the
//! wake and shutdown phrases are honored; while paused only the resume
//! intent is. The inactivity monitor in [`monitor`] runs concurrently with
//! this handler path and shares [`SharedConversationState`].

pub mod monitor;

use crate::config::ConversationConfig;
use crate::error::Result;
use crate::llm::Responder;
use crate::services::{EmotionClassifier, IntentClassifier, SpeechInput, SpeechOutput};
use crate::tasks::TaskActionEngine;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Conversation-management intents, as opposed to task-content requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlIntent {
    SayGoodbye,
    EndConversation,
    RestartConversation,
    PauseConversation,
    ResumeConversation,
    ShowHelp,
}

impl ControlIntent {
    /// Map a classifier label to a control intent. Any label outside the
    /// fixed set (including fallback labels) is non-control.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "say_goodbye" => Some(Self::SayGoodbye),
            "end_conversation" => Some(Self::EndConversation),
            "restart_conversation" => Some(Self::RestartConversation),
            "pause_conversation" => Some(Self::PauseConversation),
            "resume_conversation" => Some(Self::ResumeConversation),
            "show_help" => Some(Self::ShowHelp),
            _ => None,
        }
    }
}

/// What one utterance amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Dropped without effect (dormant non-wake input, paused input).
    Ignored,
    /// Processed to completion.
    Handled,
    /// The shutdown phrase was spoken; the process should exit.
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
struct StateInner {
    active: bool,
    paused: bool,
    last_activity: Instant,
}

/// Process-wide conversation state shared between the command-handling path
/// and the inactivity monitor.
///
/// One mutex guards all three fields; the two paths must never see a
/// half-applied transition.
#[derive(Clone)]
pub struct SharedConversationState(Arc<Mutex<StateInner>>);

impl SharedConversationState {
    /// Fresh dormant state.
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(StateInner {
            active: false,
            paused: false,
            last_activity: Instant::now(),
        })))
    }

    /// Reset the activity timestamp to now.
    pub fn touch(&self) {
        self.lock().last_activity = Instant::now();
    }

    /// Whether a conversation is active (paused or not).
    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    /// Whether the conversation is paused.
    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Activate and unpause, refreshing the activity timestamp.
    pub fn activate(&self) {
        let mut inner = self.lock();
        inner.active = true;
        inner.paused = false;
        inner.last_activity = Instant::now();
    }

    /// Set or clear the pause hold.
    pub fn set_paused(&self, paused: bool) {
        self.lock().paused = paused;
    }

    /// Return to dormant, clearing any pause.
    pub fn deactivate(&self) {
        let mut inner = self.lock();
        inner.active = false;
        inner.paused = false;
    }

    /// Elapsed time since the last activity, together with the pause flag,
    /// read under one lock so the monitor sees a consistent pair.
    pub fn idle_snapshot(&self) -> (Duration, bool, bool) {
        let inner = self.lock();
        (inner.last_activity.elapsed(), inner.active, inner.paused)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StateInner> {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for SharedConversationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the conversation lifecycle: wake/shutdown gating, intent routing,
/// control handling, and the response pipeline.
pub struct DialogManager {
    config: ConversationConfig,
    state: SharedConversationState,
    intents: Arc<dyn IntentClassifier>,
    emotions: Arc<dyn EmotionClassifier>,
    speech: Arc<dyn SpeechOutput>,
    responder: Responder,
    engine: TaskActionEngine,
}

impl DialogManager {
    /// Wire the manager with its collaborators. Service handles are
    /// long-lived and injected, never rebuilt per call.
    pub fn new(
        config: ConversationConfig,
        intents: Arc<dyn IntentClassifier>,
        emotions: Arc<dyn EmotionClassifier>,
        speech: Arc<dyn SpeechOutput>,
        responder: Responder,
        engine: TaskActionEngine,
    ) -> Self {
        Self {
            config,
            state: SharedConversationState::new(),
            intents,
            emotions,
            speech,
            responder,
            engine,
        }
    }

    /// Shared state handle for the inactivity monitor.
    pub fn state(&self) -> SharedConversationState {
        self.state.clone()
    }

    /// Read access to the task engine (console listings, tests).
    pub fn engine(&self) -> &TaskActionEngine {
        &self.engine
    }

    /// Handle one recognized utterance to completion.
    ///
    /// The activity timestamp is reset before anything else — even while
    /// dormant — so the monitor never races a long-running turn against a
    /// stale timestamp.
    pub async fn handle_utterance(
        &mut self,
        text: &str,
        audio: Option<&Path>,
    ) -> Result<TurnOutcome> {
        self.state.touch();

        let text = text.trim();
        if text.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }
        let emotion = self.emotions.classify(audio);
        let lower = text.to_lowercase();

        if !self.state.is_active() {
            if find_phrase(&lower, &self.config.shutdown_phrase).is_some() {
                info!("shutdown phrase detected");
                self.speech.speak("Goodbye.").await;
                self.speech.cue(2).await;
                return Ok(TurnOutcome::Shutdown);
            }

            if let Some((pos, len)) = find_phrase(&lower, &self.config.wake_phrase) {
                self.state.activate();
                info!("wake phrase detected, conversation active");
                self.speech.cue(1).await;
                let first_turn = extract_trailing_command(text, pos, len)
                    .unwrap_or_else(|| self.config.greeting.clone());
                self.process_turn(&first_turn, &emotion).await?;
                return Ok(TurnOutcome::Handled);
            }

            debug!("dormant, ignoring input");
            return Ok(TurnOutcome::Ignored);
        }

        self.process_turn(text, &emotion).await?;
        Ok(TurnOutcome::Handled)
    }

    async fn process_turn(&mut self, message: &str, emotion: &str) -> Result<()> {
        self.state.touch();

        let label = self.intents.classify(message).await;
        debug!(intent = label.as_deref().unwrap_or("<unreachable>"), "routed utterance");

        match label.as_deref().and_then(ControlIntent::from_label) {
            Some(intent) => self.handle_control(intent).await,
            None => {
                if self.state.is_paused() {
                    // Paused is an explicit, resumable hold: content is
                    // silently dropped until the user resumes.
                    debug!("paused, dropping content turn");
                    return Ok(());
                }
                self.respond(message, emotion).await
            }
        }
    }

    async fn handle_control(&mut self, intent: ControlIntent) -> Result<()> {
        if self.state.is_paused() && intent != ControlIntent::ResumeConversation {
            debug!("paused, dropping control intent {intent:?}");
            return Ok(());
        }

        match intent {
            ControlIntent::SayGoodbye | ControlIntent::EndConversation => {
                info!("ending conversation");
                self.speech.speak("See you later!").await;
                self.state.deactivate();
            }
            ControlIntent::RestartConversation => {
                self.responder.clear_memory();
                self.speech
                    .speak("I have restarted the conversation, but your tasks are still available.")
                    .await;
            }
            ControlIntent::PauseConversation => {
                self.state.set_paused(true);
                self.speech
                    .speak("Conversation paused. Let me know when you want to continue.")
                    .await;
            }
            ControlIntent::ResumeConversation => {
                if self.state.is_paused() {
                    self.state.set_paused(false);
                    self.speech
                        .speak("Conversation resumed. How can I help?")
                        .await;
                } else {
                    self.speech.speak("The conversation is already active.").await;
                }
            }
            ControlIntent::ShowHelp => {
                self.speech
                    .speak(
                        "You can say: end the conversation, restart the conversation, \
                         pause the conversation, or resume the conversation.",
                    )
                    .await;
            }
        }
        Ok(())
    }

    async fn respond(&mut self, message: &str, emotion: &str) -> Result<()> {
        let context = self.engine.store().context_json().to_string();
        let reply = self.responder.generate(message, &context, emotion).await;

        let final_text = if reply.tool_calls.is_empty() {
            reply.response
        } else {
            self.engine.apply(&reply.response, &reply.tool_calls)?
        };

        self.responder.record_turn(message, &final_text);
        self.speech.speak(&final_text).await;
        Ok(())
    }
}

/// Drive the listen/handle loop until the input closes or the shutdown
/// phrase is spoken.
///
/// A failed turn (store persistence, generation transport) is logged and
/// the loop keeps listening; only input exhaustion, the shutdown phrase,
/// or a broken input source end it.
pub async fn run_loop(input: &mut dyn SpeechInput, manager: &mut DialogManager) -> Result<()> {
    loop {
        let Some(utterance) = input.listen().await? else {
            info!("input closed, stopping");
            return Ok(());
        };
        match manager
            .handle_utterance(&utterance.text, utterance.audio.as_deref())
            .await
        {
            Ok(TurnOutcome::Shutdown) => {
                info!("shutdown requested");
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => {
                error!("turn failed, continuing to listen: {e}");
            }
        }
    }
}

/// Locate a spoken phrase in lowercased text, tolerating an STT-inserted
/// comma after the first word ("oye, pato"). Returns `(byte_pos, len)` of
/// the match, word-boundary checked on both sides.
fn find_phrase(lower: &str, phrase: &str) -> Option<(usize, usize)> {
    let phrase = phrase.to_lowercase();
    if phrase.is_empty() {
        return None;
    }

    let mut variants = vec![phrase.clone()];
    if let Some((first, rest)) = phrase.split_once(' ') {
        variants.push(format!("{first}, {rest}"));
    }
    // Longest first so the comma variant wins when both match.
    variants.sort_by_key(|v| std::cmp::Reverse(v.len()));

    for variant in &variants {
        let mut search_from = 0;
        while search_from < lower.len() {
            let Some(rel) = lower[search_from..].find(variant.as_str()) else {
                break;
            };
            let pos = search_from + rel;
            let end = pos + variant.len();
            let start_ok = pos == 0 || !lower.as_bytes()[pos - 1].is_ascii_alphanumeric();
            let end_ok = end >= lower.len() || !lower.as_bytes()[end].is_ascii_alphanumeric();
            if start_ok && end_ok {
                return Some((pos, variant.len()));
            }
            // Step over a full character; the phrase may start mid-word on
            // a multibyte boundary.
            search_from = pos + lower[pos..].chars().next().map_or(1, char::len_utf8);
        }
    }
    None
}

/// Extract the command text following a matched wake phrase, stripping
/// leading punctuation. `None` when the wake phrase was the whole utterance.
fn extract_trailing_command(text: &str, pos: usize, matched_len: usize) -> Option<String> {
    let after = text[pos + matched_len..]
        .trim_start_matches([',', ':', '.', '!', '?', ' '])
        .trim();
    (!after.is_empty()).then(|| after.to_owned())
}
