//! Caller-visible error types for the extension bridge.

use std::fmt;
use std::time::Duration;

use kura_core::{Capability, EnvelopeError, ExtensionFailure, SourceId};
use kura_host::HostError;
use kura_transport::{RateLimitError, TransportError};
use thiserror::Error;

/// Errors returned to callers of the bridge.
///
/// Every reply resolves either to a decoded value or to exactly one of these.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No HTTP response could be obtained.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The extension reported a failure through its result envelope.
    #[error("extension error: {0}")]
    Extension(ExtensionFailure),

    /// The module could not be loaded.
    #[error("failed to load extension: {0}")]
    HostLoad(String),

    /// The extension was disposed before the call was made.
    #[error("extension has been disposed")]
    Disposed,

    /// A rate-limit wait was longer than the configured ceiling.
    #[error("rate limit wait refused: {0}")]
    RateLimitTimeout(#[from] RateLimitError),

    /// The extension was disposed while the call was pending.
    #[error("call cancelled because the extension was disposed")]
    Cancelled,

    /// The caller's deadline elapsed first.
    #[error("call did not complete within {0:?}")]
    Timeout(Duration),

    /// The result could not be decoded into the expected type.
    #[error("failed to decode extension result: {0}")]
    Decode(String),

    /// No source with this id belongs to the extension.
    #[error("unknown source: {0}")]
    UnknownSource(SourceId),

    /// The extension or source does not provide this capability.
    #[error("{capability} is not supported: {reason}")]
    Unsupported {
        /// The capability requested.
        capability: Capability,
        /// Why it is unavailable.
        reason: String,
    },

    /// The worker thread failed or stopped unexpectedly.
    #[error("extension worker error: {0}")]
    Worker(String),

    /// The module threw while running a call.
    #[error("script error: {0}")]
    Script(String),
}

/// Broad category of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`BridgeError::Transport`].
    Transport,
    /// See [`BridgeError::Extension`].
    Extension,
    /// See [`BridgeError::HostLoad`].
    HostLoad,
    /// See [`BridgeError::Disposed`].
    Disposed,
    /// See [`BridgeError::RateLimitTimeout`].
    RateLimitTimeout,
    /// See [`BridgeError::Cancelled`].
    Cancelled,
    /// See [`BridgeError::Timeout`].
    Timeout,
    /// See [`BridgeError::Decode`].
    Decode,
    /// See [`BridgeError::UnknownSource`].
    UnknownSource,
    /// See [`BridgeError::Unsupported`].
    Unsupported,
    /// See [`BridgeError::Worker`].
    Worker,
    /// See [`BridgeError::Script`].
    Script,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transport => "transport",
            Self::Extension => "extension",
            Self::HostLoad => "host_load",
            Self::Disposed => "disposed",
            Self::RateLimitTimeout => "rate_limit_timeout",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::Decode => "decode",
            Self::UnknownSource => "unknown_source",
            Self::Unsupported => "unsupported",
            Self::Worker => "worker",
            Self::Script => "script",
        };
        f.write_str(name)
    }
}

impl BridgeError {
    /// The category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Extension(_) => ErrorKind::Extension,
            Self::HostLoad(_) => ErrorKind::HostLoad,
            Self::Disposed => ErrorKind::Disposed,
            Self::RateLimitTimeout(_) => ErrorKind::RateLimitTimeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Decode(_) => ErrorKind::Decode,
            Self::UnknownSource(_) => ErrorKind::UnknownSource,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::Worker(_) => ErrorKind::Worker,
            Self::Script(_) => ErrorKind::Script,
        }
    }

    /// The extension's failure, for [`ErrorKind::Extension`] errors.
    #[must_use]
    pub fn extension_failure(&self) -> Option<&ExtensionFailure> {
        match self {
            Self::Extension(failure) => Some(failure),
            _ => None,
        }
    }

    /// Wrap any error raised while loading a module.
    #[must_use]
    pub fn load_failure(error: impl fmt::Display) -> Self {
        Self::HostLoad(error.to_string())
    }

    pub(crate) fn unsupported(capability: Capability, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            capability,
            reason: reason.into(),
        }
    }
}

impl From<EnvelopeError> for BridgeError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Extension(failure) => Self::Extension(failure),
            other => Self::Decode(other.to_string()),
        }
    }
}

impl From<HostError> for BridgeError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Envelope(e) => e.into(),
            HostError::Script(message) => Self::Script(message),
            HostError::Engine(e) => Self::Script(e.to_string()),
            e @ (HostError::MissingExports
            | HostError::AmbiguousExports(_)
            | HostError::MissingCapability(Capability::Manifest)) => Self::load_failure(e),
            HostError::MissingCapability(capability) => {
                Self::unsupported(capability, "not exported by the module")
            },
            HostError::Protocol(message) => Self::Decode(message),
            HostError::NotLoaded => Self::Worker("no module loaded in the worker".to_owned()),
        }
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
