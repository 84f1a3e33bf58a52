//! Error types for the pan123 crate.

use thiserror::Error;

/// Errors that can occur when talking to the 123pan open platform.
#[derive(Error, Debug)]
pub enum PanError {
    #[error("Failed to acquire access token: {0}")]
    CredentialAcquisition(String),

    #[error("API error ({code}): {message}")]
    Remote { code: i64, message: String },

    /// The listing endpoint reported that a directory has no entries.
    #[error("Directory is empty")]
    EmptyDirectory,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to access state file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl PanError {
    /// True for the empty-listing signal, which is not a real failure.
    pub fn is_empty_directory(&self) -> bool {
        matches!(self, PanError::EmptyDirectory)
    }

    /// The provider's message for remote failures.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            PanError::Remote { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Result type alias for PanError.
pub type Result<T> = std::result::Result<T, PanError>;
