//! Error types for evocore operations
use thiserror::Error;

/// Result type alias for consistent error handling throughout the crate
pub type Result<T> = std::result::Result<T, EvoError>;

/// Main error type for evocore operations.
///
/// Every fallible public operation returns one of these kinds; validation
/// failures are non-fatal and leave the receiver unchanged.
#[derive(Debug, Error)]
pub enum EvoError {
    /// A required argument was empty or absent
    #[error("null argument: {0}")]
    NullArgument(&'static str),

    /// An argument was outside its valid range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A lookup found nothing (missing context, no similar failure)
    #[error("not found: {0}")]
    NotFound(String),

    /// An operation requires data that is not there (e.g. empty population)
    #[error("empty: {0}")]
    Empty(&'static str),

    /// A fixed-capacity container is full
    #[error("full: {0}")]
    Full(&'static str),

    /// IO errors (file open / write)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary magic / version mismatch or truncated payload
    #[error("format error: {0}")]
    Format(String),

    /// JSON serialization errors
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export errors
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Wrapped underlying-library failure (e.g. accelerator backend)
    #[error("unknown error: {0}")]
    Unknown(String),
}
