//! Prelude module - commonly used types for convenient import.
//!
//! Use `use kura_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{EnvelopeError, EnvelopeResult, ExtensionFailure};

// Manifest and sources
pub use crate::{Author, Manifest, SourceId, SourceInfo};

// Domain model
pub use crate::{Chapter, Filter, Manga, MangaStatus, MangasPage, Page};

// Calls
pub use crate::{Capability, ExtensionCall};
