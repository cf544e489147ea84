//! Background inactivity monitor.
//!
//! A free-running liveness guard: without it, a conversation left active but
//! abandoned would never return to dormant.

use crate::config::ConversationConfig;
use crate::dialog::SharedConversationState;
use crate::services::SpeechOutput;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Notification spoken when the conversation is force-dormanted.
pub const IDLE_NOTICE: &str = "You have been quiet for a while, so I will hide for now.";

/// Spawn the monitor task.
///
/// Polls on a fixed short interval and force-transitions the conversation to
/// dormant once the time since the last activity strictly exceeds the
/// applicable threshold: the pause timeout while paused, the inactivity
/// timeout otherwise.
pub fn spawn_inactivity_monitor(
    state: SharedConversationState,
    config: ConversationConfig,
    speech: Arc<dyn SpeechOutput>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let inactivity_timeout = Duration::from_secs(config.inactivity_timeout_s);
    let pause_timeout = Duration::from_secs(config.pause_timeout_s);
    let poll = Duration::from_millis(config.monitor_poll_ms.max(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let (idle, active, paused) = state.idle_snapshot();
                    if !active {
                        continue;
                    }
                    let threshold = if paused { pause_timeout } else { inactivity_timeout };
                    if idle > threshold {
                        state.deactivate();
                        info!(idle_s = idle.as_secs(), "inactivity timeout, returning to dormant");
                        speech.speak(IDLE_NOTICE).await;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingSpeech(std::sync::Mutex<Vec<String>>);

    #[async_trait]
    impl SpeechOutput for RecordingSpeech {
        async fn speak(&self, text: &str) {
            self.0.lock().expect("lock").push(text.to_owned());
        }
    }

    fn fast_config(inactivity_timeout_s: u64, pause_timeout_s: u64) -> ConversationConfig {
        ConversationConfig {
            inactivity_timeout_s,
            pause_timeout_s,
            monitor_poll_ms: 20,
            ..ConversationConfig::default()
        }
    }

    #[tokio::test]
    async fn active_conversation_is_force_dormanted_after_the_timeout() {
        let state = SharedConversationState::new();
        let speech = Arc::new(RecordingSpeech::default());
        let cancel = CancellationToken::new();
        let handle = spawn_inactivity_monitor(
            state.clone(),
            fast_config(1, 10),
            Arc::clone(&speech) as Arc<dyn SpeechOutput>,
            cancel.clone(),
        );

        state.activate();

        // Below the threshold nothing happens.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(state.is_active());

        // Strictly past it the monitor takes over.
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(!state.is_active());
        assert_eq!(
            speech.0.lock().expect("lock").as_slice(),
            [IDLE_NOTICE.to_owned()]
        );

        cancel.cancel();
        handle.await.expect("join monitor");
    }

    #[tokio::test]
    async fn dormant_conversation_never_triggers_the_monitor() {
        let state = SharedConversationState::new();
        let speech = Arc::new(RecordingSpeech::default());
        let cancel = CancellationToken::new();
        let handle = spawn_inactivity_monitor(
            state.clone(),
            fast_config(1, 1),
            Arc::clone(&speech) as Arc<dyn SpeechOutput>,
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(1300)).await;
        assert!(!state.is_active());
        assert!(speech.0.lock().expect("lock").is_empty());

        cancel.cancel();
        handle.await.expect("join monitor");
    }

    #[tokio::test]
    async fn paused_conversation_uses_the_longer_pause_timeout() {
        let state = SharedConversationState::new();
        let speech = Arc::new(RecordingSpeech::default());
        let cancel = CancellationToken::new();
        let handle = spawn_inactivity_monitor(
            state.clone(),
            fast_config(1, 3),
            Arc::clone(&speech) as Arc<dyn SpeechOutput>,
            cancel.clone(),
        );

        state.activate();
        state.set_paused(true);

        // Past the active timeout but under the pause timeout: still held.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(state.is_active());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(!state.is_active());

        cancel.cancel();
        handle.await.expect("join monitor");
    }

    #[tokio::test]
    async fn touch_keeps_the_conversation_alive() {
        let state = SharedConversationState::new();
        let speech = Arc::new(RecordingSpeech::default());
        let cancel = CancellationToken::new();
        let handle = spawn_inactivity_monitor(
            state.clone(),
            fast_config(1, 10),
            Arc::clone(&speech) as Arc<dyn SpeechOutput>,
            cancel.clone(),
        );

        state.activate();
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(400)).await;
            state.touch();
        }
        assert!(state.is_active());

        cancel.cancel();
        handle.await.expect("join monitor");
    }
}
