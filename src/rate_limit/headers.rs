//! `X-RateLimit-*` response headers.

use crate::clock::{duration_millis, epoch_millis};
use http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use std::time::{Duration, SystemTime};

/// Configured request limit.
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// `<limit>;w=<window seconds>`.
pub const X_RATELIMIT_POLICY: HeaderName = HeaderName::from_static("x-ratelimit-policy");
/// `limit - rate`; negative once the limit is exceeded.
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// Seconds until the current window ends.
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Header values describing one throttle decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHeaders {
    limit: u64,
    window_secs: u64,
    remaining: i64,
    reset_secs: u64,
}

impl RateLimitHeaders {
    /// Compute headers for a request that brought the rate to `rate` at `now`.
    pub fn new(limit: u64, rate: u64, window: Duration, now: SystemTime) -> Self {
        let window_ms = duration_millis(window).max(1);
        let left_ms = window_ms - epoch_millis(now) % window_ms;
        let signed = |v: u64| i64::try_from(v).unwrap_or(i64::MAX);
        Self {
            limit,
            window_secs: window.as_secs(),
            remaining: signed(limit).saturating_sub(signed(rate)),
            reset_secs: (left_ms + 999) / 1000,
        }
    }

    /// Configured limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Requests left in the window; negative when over the limit.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Whole seconds (rounded up) until the window boundary.
    pub fn reset_secs(&self) -> u64 {
        self.reset_secs
    }

    /// Policy descriptor, e.g. `100;w=60`.
    pub fn policy(&self) -> String {
        format!("{};w={}", self.limit, self.window_secs)
    }

    /// Write the four `X-RateLimit-*` headers, replacing existing values.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        if let Ok(policy) = HeaderValue::try_from(self.policy()) {
            headers.insert(X_RATELIMIT_POLICY, policy);
        }
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset_secs));
    }
}

/// Set `Retry-After` to the window length in whole seconds.
pub fn set_retry_after(headers: &mut HeaderMap, window: Duration) {
    headers.insert(RETRY_AFTER, HeaderValue::from(window.as_secs()));
}
