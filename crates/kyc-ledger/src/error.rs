//! Error types for ledger and profile storage

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input rejected before anything was written
    #[error("invalid input: {0}")]
    Validation(String),

    /// The write did not reach disk; in-memory state was rolled back
    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("store file parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("API key already registered to another profile")]
    DuplicateApiKey,
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;
