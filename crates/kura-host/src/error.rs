//! Extension host error types.

use kura_core::{Capability, EnvelopeError};
use thiserror::Error;

use crate::surface::EXPORTS_MARKER;

/// Errors raised while loading or calling a module.
#[derive(Debug, Error)]
pub enum HostError {
    /// The script engine itself failed (allocation, runtime setup).
    #[error("script engine error: {0}")]
    Engine(#[from] rquickjs::Error),

    /// The module threw while being evaluated or called.
    #[error("script error: {0}")]
    Script(String),

    /// No top-level binding carries the export marker.
    #[error("module does not install an object marked with `{EXPORTS_MARKER}`")]
    MissingExports,

    /// Several top-level bindings carry the export marker.
    #[error("module installs more than one export surface: {}", .0.join(", "))]
    AmbiguousExports(Vec<String>),

    /// The export surface lacks the function for a capability.
    #[error("module does not export `{0}`")]
    MissingCapability(Capability),

    /// A call was made before any module was loaded.
    #[error("no module loaded")]
    NotLoaded,

    /// The module broke the calling convention (e.g. returned a non-string).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The returned envelope was an extension failure or could not be decoded.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

impl HostError {
    /// Whether this error means the module could not be loaded at all.
    #[must_use]
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingExports
                | Self::AmbiguousExports(_)
                | Self::MissingCapability(Capability::Manifest)
        )
    }
}

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;
