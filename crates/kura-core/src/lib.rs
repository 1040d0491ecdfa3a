//! Kura Core - Domain types shared by every layer of the extension bridge.
//!
//! This crate provides:
//! - The static extension [`Manifest`] and per-source [`SourceInfo`]
//! - The decoded domain model ([`Manga`], [`Chapter`], [`Page`], [`Filter`])
//! - Call descriptors ([`Capability`], [`ExtensionCall`]) that name the
//!   compiled module's generated functions
//! - The result-envelope codec ([`envelope::unwrap`]) used to translate the
//!   module's `{ok, data, error}` payloads into `Result`s
//!
//! # Example
//!
//! ```rust
//! use kura_core::envelope;
//!
//! let pages: Vec<u32> = envelope::unwrap(r#"{"ok":true,"data":[1,2,3]}"#).unwrap();
//! assert_eq!(pages, vec![1, 2, 3]);
//!
//! let err = envelope::unwrap::<()>(r#"{"ok":false,"error":"boom"}"#).unwrap_err();
//! assert_eq!(err.to_string(), "extension error: boom");
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod call;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod manifest;
pub mod model;

pub use call::{CallArg, Capability, ExtensionCall};
pub use envelope::{ExtensionFailure, ResultEnvelope};
pub use error::{EnvelopeError, EnvelopeResult};
pub use filter::{Filter, SortSelection, TriState};
pub use manifest::{Author, Manifest, SourceId, SourceInfo};
pub use model::{Chapter, Manga, MangaStatus, MangasPage, Page};
