//! Ready-to-use throttle recipes ("cookbook") for sliding-throttle.
//! Each function returns a `ThrottleLayer` you can drop into `tower::ServiceBuilder`.
//!
//! **Ladder:**
//! - Simple: [`global_guard`]
//! - Intermediate: [`per_client_ip`]
//! - Advanced: [`shared_budget`]

use std::sync::Arc;
use std::time::Duration;

use http::header::HeaderName;
use sliding_throttle::rate_limit::{mapper, LocalTracker, ThrottleLayer};
use sliding_throttle::ConfigError;

/// Header most reverse proxies use for the original client address.
pub const REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// One bucket for the whole service: at most `limit` requests per minute.
pub fn global_guard<B, R>(limit: u64) -> ThrottleLayer<B, R>
where
    B: 'static,
    R: From<&'static str> + 'static,
{
    ThrottleLayer::new().with_limit(limit)
}

/// One bucket per client address taken from `X-Real-IP`.
/// Requests without the header are refused with a 500 rather than sharing a bucket.
pub fn per_client_ip<B, R>(limit: u64, window: Duration) -> Result<ThrottleLayer<B, R>, ConfigError>
where
    B: 'static,
    R: From<&'static str> + 'static,
{
    let tracker = Arc::new(LocalTracker::new(window)?);
    Ok(ThrottleLayer::new()
        .with_limit(limit)
        .with_tracker(tracker)
        .with_mapper(mapper::header(REAL_IP)))
}

/// Several routes counting into one tracker, keyed by API key.
/// Pass the returned layer (or clones of it) to every route that should share the budget.
pub fn shared_budget<B, R>(tracker: Arc<LocalTracker>, limit: u64) -> ThrottleLayer<B, R>
where
    B: 'static,
    R: From<&'static str> + 'static,
{
    ThrottleLayer::new()
        .with_limit(limit)
        .with_tracker(tracker)
        .with_mapper(mapper::header(HeaderName::from_static("x-api-key")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sliding_throttle::LimitTracker;

    #[test]
    fn recipes_build() {
        let g = global_guard::<String, String>(10);
        assert_eq!(g.limit(), 10);

        let p = per_client_ip::<String, String>(5, Duration::from_secs(1)).unwrap();
        assert_eq!(p.tracker().window_length(), Duration::from_secs(1));
        assert!(per_client_ip::<String, String>(5, Duration::ZERO).is_err());

        let tracker = Arc::new(LocalTracker::default());
        let s = shared_budget::<String, String>(tracker, 7);
        assert_eq!(s.limit(), 7);
    }
}
