//! Error types for flow-rsvp.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Tokenization errors
    #[error("Tokenization failed: {message}")]
    Tokenization { message: String },

    #[error("Tokenization request {generation} was superseded")]
    Superseded { generation: u64 },

    #[error("Tokenization request was cancelled")]
    Cancelled,

    #[error("Tokenizer worker unavailable: {message}")]
    WorkerUnavailable { message: String },

    // Progress persistence errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True for the "a newer request won" outcome, which callers treat as a
    /// silent no-op rather than a failure.
    pub fn is_superseded(&self) -> bool {
        matches!(self, EngineError::Superseded { .. })
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, EngineError>;
