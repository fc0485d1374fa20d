// SPDX-License-Identifier: MIT

//! Error types for the Strava synchronization core.

/// Top-level error type for the sync core.
///
/// Transient transport failures are retried inside [`crate::services::transport`]
/// and only surface here once the retry budget is exhausted. Rate-limit errors
/// are never retried internally: the caller decides whether to wait out
/// `retry_after_secs` or abort.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Malformed stream data: {0}")]
    Conversion(String),

    #[error("File error: {0}")]
    File(String),

    #[error("Strava API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SyncError {
    /// True for errors that mean the stored credentials are no longer usable
    /// and the user must re-run the authorization flow.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, SyncError::Authentication(_))
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;
