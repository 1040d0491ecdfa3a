//! Kura Test - Shared test utilities for the kura crates.
//!
//! This crate provides mock implementations and fixtures that can be used
//! across the kura crates as a dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! kura-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use kura_test::{MockTransport, StubBackend, fixtures};
//!
//! let transport = MockTransport::new().with_text(200, fixtures::POPULAR_PAGE_JSON);
//! let backend = StubBackend::new().with_delay(Capability::PopularManga, Duration::from_millis(50));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod mocks;

pub use fixtures::{sample_manifest, test_manifest};
pub use mocks::*;

/// Install a test subscriber honouring `RUST_LOG`, once per process.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
