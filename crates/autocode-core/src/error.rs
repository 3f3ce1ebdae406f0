//! Unified error types for autocode

use thiserror::Error;

/// Unified error type for all autocode operations
#[derive(Error, Debug)]
pub enum AutocodeError {
    // Caller errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Generative service errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Service error {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// All attempts failed transiently. The last underlying failure is kept as
    /// the source for diagnostics only.
    #[error("`{operation}` failed after {attempts} attempts")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<AutocodeError>,
    },

    // Pipeline errors
    #[error("Stage {stage} produced an invalid artifact: {reason}")]
    StageValidation { stage: String, reason: String },

    #[error("Stage {stage} failed: {message}")]
    Stage { stage: String, message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl AutocodeError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Only network-level failures and non-2xx replies qualify. Bad input,
    /// missing credentials and structurally broken bodies never do.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AutocodeError::Transport(_) | AutocodeError::Service { .. }
        )
    }
}

/// Result type alias using AutocodeError
pub type Result<T> = std::result::Result<T, AutocodeError>;
