//! Sliding-window rate limiting.
//!
//! This module provides the building blocks for request throttling:
//! - [`LimitTracker`]: The core trait for counting events per identifier.
//! - [`LocalTracker`]: In-memory, single-process implementation (approximate sliding window).
//! - [`ThrottleLayer`]: Tower middleware that enforces a request limit over HTTP.
//!
//! # Architecture
//!
//! - **Middleware**: `ThrottleLayer` wraps your service. It doesn't know *how* rates are
//!   computed, only that it should ask a `LimitTracker` to record each request.
//! - **Logic**: `LocalTracker` (in `local` module) owns the window math and purging.
//! - **Storage**: `CounterStore` (in `store` module) holds per-identifier counters.
//!
//! # Sliding window approximation
//!
//! Each identifier keeps the count for the current window and the count of the window
//! before it. The reported rate is
//!
//! ```text
//! current + floor(previous * (window - elapsed) / window)
//! ```
//!
//! where `elapsed` is how far `now` is into the current window. The previous window's
//! contribution fades linearly, which approximates a true sliding window in O(1) space.

use crate::error::TrackerError;
use std::time::{Duration, SystemTime};

pub mod headers;
pub mod local;
pub mod mapper;
pub mod middleware;
pub mod store;

pub use headers::RateLimitHeaders;
pub use local::{LocalTracker, DEFAULT_PURGE_INTERVAL};
pub use middleware::{
    ExceededHandler, RequestMapper, ThrottleLayer, ThrottleService, DEFAULT_REQUEST_LIMIT,
    DEFAULT_WINDOW_LENGTH,
};
pub use store::{Counter, CounterStore};

/// Core interface for counting requests per identifier.
///
/// All operations take `now` explicitly so behavior is deterministic under test.
/// The trait is async to allow backends that live across a network; the in-memory
/// tracker completes without suspending.
#[async_trait::async_trait]
pub trait LimitTracker: Send + Sync + std::fmt::Debug {
    /// Current decayed rate for `id` without recording an event. Unknown ids report 0.
    async fn get(&self, id: u64, now: SystemTime) -> Result<u64, TrackerError>;

    /// Record one event for `id` at `now` and return the decayed rate including it.
    async fn increment(&self, id: u64, now: SystemTime) -> Result<u64, TrackerError>;

    /// Configured window length.
    fn window_length(&self) -> Duration;
}
