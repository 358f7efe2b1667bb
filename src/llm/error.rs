//! Typed errors for model operations
//!
//! Structured variants let callers distinguish common failure modes
//! (auth, rate limiting, transient server errors) without string matching.

use thiserror::Error;

/// Model operation errors with typed variants
#[derive(Debug, Error)]
pub enum LlmError {
    /// Authentication is missing, expired, or invalid (HTTP 401/403)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Malformed request (HTTP 400); indicates a bug on our side
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Server-side error (HTTP 5xx)
    #[error("Service error: {0}")]
    ServiceError(String),

    /// Connection refused, timeout, DNS failure
    #[error("Network error: {0}")]
    Network(String),

    /// Other errors not fitting the above categories
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LlmError {
    /// Classify a non-success HTTP response from the model API
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => LlmError::Unauthorized(body),
            429 => LlmError::RateLimited(body),
            400 => LlmError::BadRequest(body),
            s if s >= 500 => LlmError::ServiceError(format!("{status}: {body}")),
            _ => LlmError::ServiceError(format!("{status}: {body}")),
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}
