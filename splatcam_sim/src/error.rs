//! Error types for the playback harness.

use splatcam_env::EnvError;
use thiserror::Error;

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
pub enum SimError {
    /// Scene could not be fetched
    #[error("Environment error: {0}")]
    Env(#[from] EnvError),

    /// Parameter file or export could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Export could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Command-line value out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl SimError {
    /// Creates an invalid-argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
