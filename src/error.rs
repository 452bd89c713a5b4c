//! Error types for the Attune engine

use thiserror::Error;

/// Errors that can occur at the engine boundary
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse persisted state: {0}")]
    StateParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid timezone offset: {0}")]
    InvalidTimezone(String),

    #[error("Out-of-range value for {field}: {value}")]
    OutOfRange { field: String, value: f64 },

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Narrative generation failed: {0}")]
    NarrativeError(String),
}
