#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Sliding Throttle
//!
//! Request-rate throttling for `tower` HTTP services, built on an approximate
//! sliding-window counter.
//!
//! ## Features
//!
//! - **Sliding-window tracker** with O(1) state per identifier and linear decay of
//!   the previous window
//! - **Opportunistic purging** of idle identifiers, driven by traffic instead of a timer
//! - **Tower middleware** that sets `X-RateLimit-*` headers and rejects with `429`
//! - **Pluggable seams**: identifier mapper, exceeded handler, tracker backend, clock
//!
//! ## Quick Start
//!
//! ```rust
//! use sliding_throttle::prelude::*;
//! use http::{Request, Response};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tower::{service_fn, ServiceBuilder, ServiceExt};
//!
//! #[tokio::main]
//! async fn main() {
//!     let tracker = Arc::new(LocalTracker::new(Duration::from_secs(60)).unwrap());
//!     let svc = ServiceBuilder::new()
//!         .layer(ThrottleLayer::<String, String>::new().with_limit(100).with_tracker(tracker))
//!         .service(service_fn(|_req: Request<String>| async {
//!             Ok::<_, std::convert::Infallible>(Response::new(String::from("hello")))
//!         }));
//!
//!     let resp = svc.oneshot(Request::new(String::new())).await.unwrap();
//!     assert_eq!(resp.headers()["x-ratelimit-remaining"], "99");
//! }
//! ```

pub mod clock;
pub mod error;
pub mod prelude;
pub mod rate_limit;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, MapperError, TrackerError};
pub use rate_limit::{LimitTracker, LocalTracker, ThrottleLayer, ThrottleService};
