//! Convenient re-exports for common throttling types.
pub use crate::{
    clock::{Clock, ManualClock, SystemClock},
    error::{ConfigError, MapperError, TrackerError},
    rate_limit::{
        mapper, LimitTracker, LocalTracker, RateLimitHeaders, ThrottleLayer, ThrottleService,
        DEFAULT_PURGE_INTERVAL, DEFAULT_REQUEST_LIMIT, DEFAULT_WINDOW_LENGTH,
    },
};
