//! Configuration types.
//!
//! Every section implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header yields a working setup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker threads and script engine limits.
    pub runtime: RuntimeSection,
    /// The `curl` transport.
    pub transport: TransportSection,
    /// Per-source request quotas.
    pub rate_limit: RateLimitSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

/// Worker threads and script engine limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Stack of each extension worker thread in KiB (0 = platform default).
    pub worker_stack_kb: u32,
    /// Script engine heap limit in MiB (0 = unlimited).
    pub memory_limit_mb: u32,
    /// Script engine stack limit in KiB (0 = engine default).
    pub max_stack_kb: u32,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            worker_stack_kb: 4096,
            memory_limit_mb: 256,
            max_stack_kb: 1024,
        }
    }
}

/// Settings for the `curl` transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    /// Path to `curl`; empty to search `PATH`.
    pub curl_path: String,
    /// Total time allowed per request, in seconds.
    pub timeout_secs: u64,
    /// Time allowed for connection setup, in seconds.
    pub connect_timeout_secs: u64,
    /// Redirects followed per request.
    pub max_redirects: u32,
    /// User agent sent when an extension sets none (empty to send curl's).
    pub user_agent: String,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            curl_path: String::new(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_redirects: 10,
            user_agent: "Mozilla/5.0 (compatible; kura/0.1)".to_owned(),
        }
    }
}

/// Request quotas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    /// Whether requests are limited at all.
    pub enabled: bool,
    /// Requests allowed per window for each source.
    pub permits: u32,
    /// Window length in milliseconds.
    pub period_ms: u64,
    /// Longest wait accepted before a request is refused, in milliseconds.
    pub max_wait_ms: u64,
    /// Longest sleep between clock checks while waiting, in milliseconds.
    pub poll_interval_ms: u64,
    /// Overrides keyed by source id.
    pub sources: HashMap<String, SourceRateLimit>,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            enabled: true,
            permits: 5,
            period_ms: 1000,
            max_wait_ms: 30_000,
            poll_interval_ms: 5,
            sources: HashMap::new(),
        }
    }
}

/// Quota override for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRateLimit {
    /// Requests allowed per window.
    pub permits: u32,
    /// Window length in milliseconds.
    pub period_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate directives (e.g. `["kura_transport=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
