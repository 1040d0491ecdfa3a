//! Kura Host - Runs compiled extension modules in isolated script namespaces.
//!
//! An [`ExtensionHost`] owns one QuickJS runtime and context. Loading a module
//! installs the transport hook, evaluates the code, and discovers the module's
//! generated export surface. Calls are then made synchronously through
//! [`ExtensionHost::call`], which decodes the returned result envelope.
//!
//! The host is not `Send`: it is created and driven by a single thread for
//! its whole life, which is what lets the module block on network requests
//! without involving any async runtime.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use kura_core::ExtensionCall;
//! use kura_host::{ExtensionHost, HostOptions};
//! use kura_transport::{CurlTransport, RateLimiter};
//!
//! # fn main() -> Result<(), kura_host::HostError> {
//! let mut host = ExtensionHost::new(
//!     HostOptions::default(),
//!     Arc::new(CurlTransport::default()),
//!     RateLimiter::default(),
//! )?;
//! host.load("globalThis.ext = { __generatedExports: { getManifest() { return '{\"ok\":true,\"data\":[]}'; } } };")?;
//! let sources = host.call(&ExtensionCall::Manifest)?;
//! assert!(sources.is_array());
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
mod gateway;
mod hook;
mod host;
mod surface;

pub use error::{HostError, HostResult};
pub use gateway::NetworkGateway;
pub use hook::{HOOK_NAME, install as install_hook};
pub use host::{ExtensionHost, HostOptions};
pub use surface::{EXPORTS_MARKER, ExportSurface};
