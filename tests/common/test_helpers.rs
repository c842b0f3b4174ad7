use async_trait::async_trait;
use http::{Request, Response};
use sliding_throttle::{LimitTracker, TrackerError};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Start of a window for every window length the tests use.
pub fn aligned() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_699_999_200)
}

pub fn request() -> Request<String> {
    Request::new(String::new())
}

/// Inner service that counts how often it was reached.
#[derive(Clone, Default)]
pub struct CountingSvc {
    pub calls: Arc<AtomicUsize>,
}

impl CountingSvc {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl tower::Service<Request<String>> for CountingSvc {
    type Response = Response<String>;
    type Error = Infallible;
    type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: Request<String>) -> Self::Future {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok(Response::new("downstream".to_string())))
    }
}

/// Tracker whose backend is always down.
#[derive(Debug)]
pub struct UnavailableTracker {
    pub window: Duration,
}

#[async_trait]
impl LimitTracker for UnavailableTracker {
    async fn get(&self, _id: u64, _now: SystemTime) -> Result<u64, TrackerError> {
        Err(TrackerError::Unavailable("backend down".into()))
    }

    async fn increment(&self, _id: u64, _now: SystemTime) -> Result<u64, TrackerError> {
        Err(TrackerError::Unavailable("backend down".into()))
    }

    fn window_length(&self) -> Duration {
        self.window
    }
}
