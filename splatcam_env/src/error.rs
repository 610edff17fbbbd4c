//! Error types for the splatcam environment abstraction.

use thiserror::Error;

/// Errors that can occur while talking to the outside world.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The requested scene does not exist in the source
    #[error("Scene not found: {0}")]
    NotFound(String),

    /// Reading the scene bytes failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The locator escapes the source root or is empty
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),
}

impl EnvError {
    /// Creates a not-found error.
    pub fn not_found(locator: impl Into<String>) -> Self {
        Self::NotFound(locator.into())
    }

    /// Creates an invalid-locator error.
    pub fn invalid_locator(locator: impl std::fmt::Display) -> Self {
        Self::InvalidLocator(locator.to_string())
    }
}
