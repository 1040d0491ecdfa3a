//! Transport and rate limiting error types.

use std::time::Duration;

use thiserror::Error;

/// Failures to obtain any HTTP response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport program could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that was invoked.
        program: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The transport program ran but produced no output.
    #[error("transport produced no output (exit code {exit_code:?}): {stderr}")]
    NoOutput {
        /// Process exit code, if it exited normally.
        exit_code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The transport program could not be located.
    #[error("transport program not found: {0}")]
    NotFound(String),

    /// IO error while talking to the transport process.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Rate limiter refusals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    /// The wait needed for admission exceeds the configured ceiling.
    #[error("rate limit for '{key}' requires waiting {wait:?}, above the {max_wait:?} ceiling")]
    WaitExceeded {
        /// Source key that is over quota.
        key: String,
        /// Wait that would have been required.
        wait: Duration,
        /// Configured ceiling.
        max_wait: Duration,
    },
}

/// Result type for rate limiting operations.
pub type RateLimitResult<T> = Result<T, RateLimitError>;
