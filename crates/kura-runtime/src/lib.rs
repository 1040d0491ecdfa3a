//! Kura Runtime - Asynchronous façade over isolated extension workers.
//!
//! Extension modules expect to block on network I/O. This crate gives each
//! loaded module its own OS thread, owning the script engine and the rate
//! limiter, and talks to it through channels only:
//!
//! - [`ExtensionBridge`] loads modules and returns [`LoadedExtension`] handles
//! - Handle methods dispatch immediately and return [`Reply`] futures,
//!   correlated by id and answered in dispatch order
//! - [`LoadedExtension::dispose`] cancels pending replies and lets the
//!   worker drop the engine
//!
//! # Example
//!
//! ```rust,no_run
//! use kura_core::Manifest;
//! use kura_runtime::{BridgeConfig, ExtensionBridge};
//!
//! # async fn example(manifest: Manifest, code: String) -> kura_runtime::BridgeResult<()> {
//! let bridge = ExtensionBridge::new(BridgeConfig::default());
//! let extension = bridge.load_extension(manifest, code).await?;
//!
//! let source = extension.sources()[0].id.clone();
//! let popular = extension.popular_manga(source, 1)?.await?;
//! println!("{} entries", popular.mangas.len());
//!
//! extension.dispose();
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

mod backend;
mod bridge;
mod config;
mod error;
mod handle;
mod pending;
mod reply;
mod state;
mod worker;

pub use backend::{BackendFactory, ExtensionBackend, ScriptBackend};
pub use bridge::ExtensionBridge;
pub use config::{BridgeConfig, RateLimitSettings};
pub use error::{BridgeError, BridgeResult, ErrorKind};
pub use handle::LoadedExtension;
pub use reply::Reply;
pub use state::ExtensionState;
