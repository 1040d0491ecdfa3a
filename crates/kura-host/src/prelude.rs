//! Prelude module - commonly used types for convenient import.
//!
//! Use `use kura_host::prelude::*;` to import all essential types.

pub use crate::{ExportSurface, ExtensionHost, HostError, HostOptions, HostResult};
