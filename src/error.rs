//! Error types for the assistant core.

/// Top-level error type for the assistant.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Task store persistence error.
    #[error("store error: {0}")]
    Store(String),

    /// Text-generation service error.
    #[error("generation error: {0}")]
    Generation(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AssistantError>;
