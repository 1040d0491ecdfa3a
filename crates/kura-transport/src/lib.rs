//! Kura Transport - Network access for hosted extensions.
//!
//! Extensions issue HTTP requests synchronously and expect the response
//! inline. This crate performs those requests out-of-process and gates them:
//!
//! - [`Transport`] is the seam the extension host calls through.
//! - [`CurlTransport`] runs one `curl` process per request and recovers
//!   status, headers and body from its combined output ([`wire::parse_output`]).
//! - [`RateLimiter`] admits requests per source key using a timestamp log,
//!   blocking the calling thread (never an async runtime) when a source is
//!   over quota.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod curl;
mod error;
pub mod rate_limit;
pub mod wire;

pub use curl::{CurlOptions, CurlTransport};
pub use error::{RateLimitError, RateLimitResult, TransportError, TransportResult};
pub use rate_limit::{RateLimit, RateLimiter, WaitPolicy};
pub use wire::{WireBody, WireRequest, WireResponse};

/// Executes one HTTP request and returns the complete response.
///
/// Implementations block the calling thread until the response is available.
/// HTTP error statuses are not errors at this layer; only failures to obtain
/// any response are.
pub trait Transport: Send + Sync {
    /// Perform `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if no response could be obtained.
    fn execute(&self, request: &WireRequest) -> TransportResult<WireResponse>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &WireRequest) -> TransportResult<WireResponse> {
        (**self).execute(request)
    }
}
