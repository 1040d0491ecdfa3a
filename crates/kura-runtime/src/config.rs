//! Bridge settings derived from the layered configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use kura_config::Config;
use kura_host::HostOptions;
use kura_transport::{CurlOptions, RateLimit, RateLimiter, WaitPolicy};

/// Rate limiting settings applied to every loaded extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Whether requests are limited at all.
    pub enabled: bool,
    /// Limit for sources without an override.
    pub default_limit: RateLimit,
    /// Blocking behaviour.
    pub policy: WaitPolicy,
    /// Per-source overrides keyed by source id.
    pub sources: HashMap<String, RateLimit>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_limit: RateLimit::default(),
            policy: WaitPolicy::default(),
            sources: HashMap::new(),
        }
    }
}

impl RateLimitSettings {
    /// Build a fresh limiter with these settings.
    #[must_use]
    pub fn limiter(&self) -> RateLimiter {
        if !self.enabled {
            return RateLimiter::disabled();
        }
        self.sources.iter().fold(
            RateLimiter::new(self.default_limit, self.policy),
            |limiter, (source, limit)| limiter.with_source_limit(source.clone(), *limit),
        )
    }
}

/// Settings for an [`ExtensionBridge`](crate::ExtensionBridge).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Stack size of worker threads in bytes, platform default when `None`.
    pub worker_stack_size: Option<usize>,
    /// Script engine limits.
    pub host: HostOptions,
    /// Options for the `curl` transport.
    pub curl: CurlOptions,
    /// Rate limiting.
    pub rate_limit: RateLimitSettings,
}

impl BridgeConfig {
    /// Derive bridge settings from a loaded [`Config`].
    ///
    /// An empty `curl_path` is resolved on `PATH`, falling back to plain
    /// `curl` when discovery fails.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let runtime = &config.runtime;
        let transport = &config.transport;
        let limits = &config.rate_limit;

        let mut curl = if transport.curl_path.is_empty() {
            CurlOptions::discover().unwrap_or_default()
        } else {
            CurlOptions {
                program: PathBuf::from(&transport.curl_path),
                ..CurlOptions::default()
            }
        };
        curl.timeout = Duration::from_secs(transport.timeout_secs);
        curl.connect_timeout = Duration::from_secs(transport.connect_timeout_secs);
        curl.max_redirects = transport.max_redirects;
        curl.user_agent = Some(transport.user_agent.clone()).filter(|ua| !ua.is_empty());

        let host = HostOptions {
            memory_limit: scaled(runtime.memory_limit_mb, 1_048_576),
            max_stack_size: scaled(runtime.max_stack_kb, 1024),
        };

        let rate_limit = RateLimitSettings {
            enabled: limits.enabled,
            default_limit: RateLimit::new(limits.permits, Duration::from_millis(limits.period_ms)),
            policy: WaitPolicy {
                max_wait: Duration::from_millis(limits.max_wait_ms),
                poll_interval: Duration::from_millis(limits.poll_interval_ms),
            },
            sources: limits
                .sources
                .iter()
                .map(|(id, source)| {
                    (
                        id.clone(),
                        RateLimit::new(source.permits, Duration::from_millis(source.period_ms)),
                    )
                })
                .collect(),
        };

        Self {
            worker_stack_size: scaled(runtime.worker_stack_kb, 1024),
            host,
            curl,
            rate_limit,
        }
    }
}

/// `value * unit` in bytes, `None` for zero (meaning "engine default").
fn scaled(value: u32, unit: usize) -> Option<usize> {
    if value == 0 {
        return None;
    }
    usize::try_from(value).ok()?.checked_mul(unit)
}
