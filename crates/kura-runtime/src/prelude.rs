//! Prelude module - commonly used types for convenient import.
//!
//! Use `use kura_runtime::prelude::*;` to import all essential types.

pub use crate::{
    BridgeConfig, BridgeError, BridgeResult, ErrorKind, ExtensionBackend, ExtensionBridge,
    ExtensionState, LoadedExtension, Reply,
};
