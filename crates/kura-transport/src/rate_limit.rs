//! Per-source request rate limiting.
//!
//! Each source key owns a log of grant timestamps. Before every admission the
//! log is purged of grants older than the window; if the source still holds
//! `permits` grants the caller blocks until the oldest one ages out.
//!
//! The limiter is owned by a single thread (the extension's isolated worker)
//! and takes `&mut self`; it needs no locks. Blocking is a polling wait on
//! the monotonic clock in short sleep slices, bounded by a hard ceiling so a
//! misconfigured quota cannot stall the worker indefinitely.

use std::collections::{HashMap, VecDeque};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{RateLimitError, RateLimitResult};

/// Quota for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Grants allowed per window, at least 1.
    pub permits: u32,
    /// Window length.
    pub period: Duration,
}

impl RateLimit {
    /// Create a new rate limit. `permits` is clamped to at least 1.
    #[must_use]
    pub fn new(permits: u32, period: Duration) -> Self {
        Self {
            permits: permits.max(1),
            period,
        }
    }

    /// Create a limit of N requests per second.
    #[must_use]
    pub fn per_second(permits: u32) -> Self {
        Self::new(permits, Duration::from_secs(1))
    }

    /// Create a limit of N requests per minute.
    #[must_use]
    pub fn per_minute(permits: u32) -> Self {
        Self::new(permits, Duration::from_secs(60))
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::per_second(5)
    }
}

/// How admissions block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Longest wait accepted for one admission.
    pub max_wait: Duration,
    /// Longest single sleep between clock checks.
    ///
    /// Waiting sleeps the thread in slices rather than spinning; a zero
    /// interval is raised to a 1 ms floor.
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(30),
            poll_interval: Duration::from_millis(5),
        }
    }
}

/// Grant log for one source key.
#[derive(Debug)]
struct WindowTracker {
    /// Grant timestamps, oldest first.
    grants: VecDeque<Instant>,
    limit: RateLimit,
}

impl WindowTracker {
    fn new(limit: RateLimit) -> Self {
        Self {
            grants: VecDeque::new(),
            limit,
        }
    }

    /// Drop grants whose age reached the window length.
    fn purge(&mut self, now: Instant) {
        while let Some(oldest) = self.grants.front() {
            if now.saturating_duration_since(*oldest) >= self.limit.period {
                self.grants.pop_front();
            } else {
                break;
            }
        }
    }

    /// Wait required before the next grant, `None` when one is available now.
    fn wait_needed(&self, now: Instant) -> Option<Duration> {
        if self.grants.len() < self.limit.permits as usize {
            return None;
        }
        let oldest = self.grants.front()?;
        let frees_at = oldest.checked_add(self.limit.period)?;
        Some(frees_at.saturating_duration_since(now))
    }

    fn record(&mut self, now: Instant) {
        self.grants.push_back(now);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn remaining(&self, now: Instant) -> u32 {
        let live = self
            .grants
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < self.limit.period)
            .count();
        self.limit.permits.saturating_sub(live as u32)
    }
}

/// Rate limiter keyed by source.
#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    default_limit: RateLimit,
    overrides: HashMap<String, RateLimit>,
    policy: WaitPolicy,
    trackers: HashMap<String, WindowTracker>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimit::default(), WaitPolicy::default())
    }
}

impl RateLimiter {
    /// Create a limiter applying `default_limit` to every key.
    #[must_use]
    pub fn new(default_limit: RateLimit, policy: WaitPolicy) -> Self {
        Self {
            enabled: true,
            default_limit,
            overrides: HashMap::new(),
            policy,
            trackers: HashMap::new(),
        }
    }

    /// A limiter that admits everything immediately.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Use `limit` instead of the default for `key`.
    #[must_use]
    pub fn with_source_limit(mut self, key: impl Into<String>, limit: RateLimit) -> Self {
        self.overrides.insert(key.into(), limit);
        self
    }

    /// The limit that applies to `key`.
    #[must_use]
    pub fn limit_for(&self, key: &str) -> RateLimit {
        self.overrides
            .get(key)
            .copied()
            .unwrap_or(self.default_limit)
    }

    /// Block until a request for `key` may proceed, then record it.
    ///
    /// Returns how long the caller was held back.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::WaitExceeded`] without waiting when the
    /// required wait is longer than the policy's `max_wait`.
    pub fn admit(&mut self, key: &str) -> RateLimitResult<Duration> {
        if !self.enabled {
            return Ok(Duration::ZERO);
        }

        let started = Instant::now();
        let limit = self.limit_for(key);
        let policy = self.policy;
        let tracker = self
            .trackers
            .entry(key.to_owned())
            .or_insert_with(|| WindowTracker::new(limit));

        loop {
            let now = Instant::now();
            tracker.purge(now);

            let Some(wait) = tracker.wait_needed(now) else {
                tracker.record(now);
                return Ok(started.elapsed());
            };

            if wait > policy.max_wait {
                return Err(RateLimitError::WaitExceeded {
                    key: key.to_owned(),
                    wait,
                    max_wait: policy.max_wait,
                });
            }

            debug!(
                source = key,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "rate limit reached, holding request"
            );
            block_for(wait, policy.poll_interval);
        }
    }

    /// Grants still available for `key` in the current window.
    #[must_use]
    pub fn remaining(&self, key: &str) -> u32 {
        self.trackers.get(key).map_or_else(
            || self.limit_for(key).permits,
            |tracker| tracker.remaining(Instant::now()),
        )
    }

    /// Forget every recorded grant.
    pub fn reset(&mut self) {
        self.trackers.clear();
    }
}

/// Hold the current thread for `wait`, re-checking the clock at least every
/// `poll_interval`.
fn block_for(wait: Duration, poll_interval: Duration) {
    let Some(deadline) = Instant::now().checked_add(wait) else {
        return;
    };
    let slice = poll_interval.max(Duration::from_millis(1));

    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        if left.is_zero() {
            break;
        }
        thread::sleep(left.min(slice));
    }
}
