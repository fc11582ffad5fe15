//! Heimdall error types

use std::time::Duration;

/// Heimdall error types
#[derive(Debug, thiserror::Error)]
pub enum HeimdallError {
    // Admission errors
    #[error("rate limit exceeded, retry after {:.2}s", retry_after.as_secs_f64())]
    RateLimited { retry_after: Duration },

    // Request errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("prompt too long: {length} > {limit} characters")]
    PromptTooLong { length: usize, limit: usize },

    // Generator/network errors
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no generator configured")]
    NoGenerator,
}

impl HeimdallError {
    /// Whether a generator call failing with this error is worth retrying.
    ///
    /// Network failures, upstream rate limiting and 5xx responses are
    /// transient. Everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            HeimdallError::Http(_) | HeimdallError::RateLimited { .. } => true,
            HeimdallError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Retry hint carried by a rate-limit error, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            HeimdallError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HeimdallError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => HeimdallError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => HeimdallError::Http(err.to_string()),
        }
    }
}

/// Result type alias for Heimdall operations
pub type Result<T> = std::result::Result<T, HeimdallError>;
