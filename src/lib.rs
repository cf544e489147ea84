//! PATO: voice-driven personal task assistant — orchestration core.
//!
//! The ML collaborators (speech recognition, emotion and intent
//! classification, text generation, speech synthesis) live behind narrow
//! service traits; this crate owns the stateful control logic between them:
//!
//! - **Conversation state machine**: dormant → active → (paused) → dormant,
//!   wake/shutdown phrase gating, and an inactivity monitor running
//!   concurrently with command handling.
//! - **Task-action engine**: applies structured action batches from the
//!   generator against a file-backed task store, with a bounded single-step
//!   undo history.
//! - **Response validator**: generate-and-validate-with-retry over the
//!   generation service, failing soft to a fixed reply.

pub mod config;
pub mod dialog;
pub mod error;
pub mod llm;
pub mod services;
pub mod tasks;

pub use config::AssistantConfig;
pub use dialog::monitor::spawn_inactivity_monitor;
pub use dialog::{run_loop, ControlIntent, DialogManager, SharedConversationState, TurnOutcome};
pub use error::{AssistantError, Result};
pub use llm::{GeneratedReply, Responder};
pub use tasks::{ActionKind, ActionRequest, Priority, Task, TaskActionEngine, TaskStore};
