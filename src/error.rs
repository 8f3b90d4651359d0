//! Error types for the insight engine

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, InsightError>;

/// Engine error taxonomy
///
/// Only `Configuration` is allowed to abort the process, and only at startup.
/// Provider and budget conditions are absorbed per-rule by the selector and
/// reflected as bundle gaps instead of surfacing to the caller.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider call timed out after {0}ms")]
    ProviderTimeout(u64),

    #[error("Generation service error: {0}")]
    Generation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl InsightError {
    /// Whether this error is fatal at startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, InsightError::Configuration(_))
    }
}
