//! Rate-limited access to the transport for one extension.

use std::sync::Arc;

use kura_core::SourceId;
use kura_transport::{RateLimiter, Transport, WireRequest, WireResponse};
use tracing::{debug, warn};

/// Routes every request a module makes through the rate limiter and the
/// transport.
///
/// Failures never escape as errors: the module sees them as a response with
/// status `0` and `error` set, the same shape a real transport failure has.
pub struct NetworkGateway {
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    active_source: Option<SourceId>,
}

impl std::fmt::Debug for NetworkGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkGateway")
            .field("limiter", &self.limiter)
            .field("active_source", &self.active_source)
            .finish_non_exhaustive()
    }
}

impl NetworkGateway {
    /// Create a gateway over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, limiter: RateLimiter) -> Self {
        Self {
            transport,
            limiter,
            active_source: None,
        }
    }

    /// Set the source whose call is currently running.
    pub fn set_active_source(&mut self, source: Option<SourceId>) {
        self.active_source = source;
    }

    /// The source whose call is currently running.
    #[must_use]
    pub fn active_source(&self) -> Option<&SourceId> {
        self.active_source.as_ref()
    }

    /// The limiter key for a request to `url`.
    ///
    /// Requests made on behalf of a source are keyed by its id; others (the
    /// manifest call) by the URL's host.
    #[must_use]
    pub fn rate_key(&self, url: &str) -> String {
        if let Some(source) = &self.active_source {
            return source.as_str().to_owned();
        }
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_else(|| "unknown".to_owned());
        format!("host:{host}")
    }

    /// Admit and perform `request`.
    pub fn execute(&mut self, request: &WireRequest) -> WireResponse {
        let key = self.rate_key(&request.url);

        match self.limiter.admit(&key) {
            Ok(waited) if !waited.is_zero() => {
                debug!(
                    source = %key,
                    waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                    "request admitted after rate limit wait"
                );
            },
            Ok(_) => {},
            Err(e) => {
                warn!(source = %key, url = %request.url, error = %e, "request refused by rate limiter");
                return WireResponse::failure(e.to_string());
            },
        }

        match self.transport.execute(request) {
            Ok(response) => response,
            Err(e) => {
                warn!(source = %key, url = %request.url, error = %e, "transport failed");
                WireResponse::failure(e.to_string())
            },
        }
    }
}
