//! Error types for eSignet OAuth operations

use std::time::Duration;

/// Errors from PKCE, token exchange and token decoding.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing required field(s): {0}")]
    MissingFields(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token endpoint did not respond within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("token endpoint returned {status}: {error}")]
    Upstream {
        status: u16,
        error: String,
        description: Option<String>,
    },

    #[error("PKCE verification failed: {0}")]
    PkceVerificationFailed(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("client assertion error: {0}")]
    ClientAssertion(String),
}

/// Result alias for eSignet operations.
pub type Result<T> = std::result::Result<T, Error>;
