//! Prelude module - commonly used types for convenient import.
//!
//! Use `use kura_test::prelude::*;` to import all test helpers.

pub use crate::fixtures;
pub use crate::{MockTransport, StubBackend, init_test_logging, sample_manifest, test_manifest};
