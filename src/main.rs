//! Console front-end for the assistant: one utterance per stdin line,
//! replies on stdout, diagnostics on stderr.

use pato::config::AssistantConfig;
use pato::dialog::monitor::spawn_inactivity_monitor;
use pato::dialog::{run_loop, DialogManager};
use pato::llm::Responder;
use pato::services::console::{ConsoleInput, ConsoleOutput};
use pato::services::{
    HttpIntentClassifier, HttpTextGenerator, NullEmotionClassifier, SpeechOutput,
};
use pato::tasks::{TaskActionEngine, TaskStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Tracing to stderr only; stdout carries the conversation.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AssistantConfig::load_or_default();
    tracing::info!(
        wake_phrase = %config.conversation.wake_phrase,
        data_dir = %config.store.data_dir.display(),
        "starting assistant"
    );

    let store = TaskStore::open(&config.store.data_dir)?;
    let engine = TaskActionEngine::new(store);
    let responder = Responder::new(
        Arc::new(HttpTextGenerator::new(&config.generation)),
        &config.generation,
    );
    let speech: Arc<dyn SpeechOutput> = Arc::new(ConsoleOutput);

    let mut manager = DialogManager::new(
        config.conversation.clone(),
        Arc::new(HttpIntentClassifier::new(&config.intent)),
        Arc::new(NullEmotionClassifier),
        Arc::clone(&speech),
        responder,
        engine,
    );

    let cancel = CancellationToken::new();
    let monitor = spawn_inactivity_monitor(
        manager.state(),
        config.conversation.clone(),
        Arc::clone(&speech),
        cancel.clone(),
    );

    speech.cue(2).await;
    tracing::info!("assistant ready");

    let mut input = ConsoleInput::new();
    run_loop(&mut input, &mut manager).await?;

    cancel.cancel();
    let _ = monitor.await;
    Ok(())
}
