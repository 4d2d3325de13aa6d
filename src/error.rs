//! Error types for the storefront guard service.

use thiserror::Error;

/// Main error type for service-level operations.
///
/// A rejected request is not an error; see
/// [`RateLimitDecision`](crate::ratelimit::RateLimitDecision).
#[derive(Error, Debug)]
pub enum GuardError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for GuardError {
    fn from(err: ::config::ConfigError) -> Self {
        GuardError::Config(err.to_string())
    }
}

/// Result type alias for service-level operations.
pub type Result<T> = std::result::Result<T, GuardError>;
