//! Kura Telemetry - logging setup for the kura extension bridge.
//!
//! Extension workers log each call inside an `extension_call` span carrying
//! the extension name, call id, sequence number and capability; this crate
//! installs the `tracing` subscriber that renders them.
//!
//! # Example
//!
//! ```rust,no_run
//! use kura_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), kura_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("kura_transport=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("bridge starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
