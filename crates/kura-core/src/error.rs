//! Envelope decoding error types.

use thiserror::Error;

use crate::envelope::ExtensionFailure;

/// Errors produced while decoding a result envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope decoded cleanly and reported `ok: false`.
    #[error("extension error: {0}")]
    Extension(ExtensionFailure),

    /// The payload is JSON but violates the envelope contract.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// The payload is not valid JSON, or `data` does not match the expected type.
    #[error("envelope decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl EnvelopeError {
    /// Returns the extension failure if this error came from `ok: false`.
    #[must_use]
    pub fn as_extension_failure(&self) -> Option<&ExtensionFailure> {
        match self {
            Self::Extension(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Result type for envelope operations.
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;
