use crate::clock::{Clock, SystemClock};
use crate::error::MapperError;
use crate::rate_limit::headers::{set_retry_after, RateLimitHeaders};
use crate::rate_limit::local::LocalTracker;
use crate::rate_limit::{mapper, LimitTracker};
use futures::future::BoxFuture;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Request, Response, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

pub use crate::rate_limit::local::DEFAULT_WINDOW_LENGTH;

/// Limit applied when none (or 0) is configured.
pub const DEFAULT_REQUEST_LIMIT: u64 = 100;

/// Maps a request to the identifier it is counted against.
pub type RequestMapper<B> = Arc<dyn Fn(&Request<B>) -> Result<u64, MapperError> + Send + Sync>;

/// Builds the response for a request over the limit.
pub type ExceededHandler<B, R> = Arc<dyn Fn(&Request<B>) -> Response<R> + Send + Sync>;

/// A layer that throttles HTTP requests using a [`LimitTracker`].
///
/// Each request is mapped to an identifier, recorded with the tracker, and either
/// forwarded or answered by the exceeded handler. `X-RateLimit-*` headers are written
/// on both outcomes. Mapper and tracker failures become `500` responses; the inner
/// service's error type passes through untouched.
///
/// Defaults: limit 100, a fresh [`LocalTracker`] with a 60 second window, every
/// request in one bucket, and a plain `429 Too Many Requests` when exceeded.
///
/// # Examples
/// ```
/// use sliding_throttle::rate_limit::{mapper, LocalTracker, ThrottleLayer};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let tracker = Arc::new(LocalTracker::new(Duration::from_secs(10)).unwrap());
/// let layer = ThrottleLayer::<String, String>::new()
///     .with_limit(20)
///     .with_tracker(tracker)
///     .with_mapper(mapper::header(http::header::HeaderName::from_static("x-real-ip")));
/// assert_eq!(layer.limit(), 20);
/// ```
pub struct ThrottleLayer<B, R> {
    limit: u64,
    tracker: Arc<dyn LimitTracker>,
    mapper: RequestMapper<B>,
    exceeded: ExceededHandler<B, R>,
    clock: Arc<dyn Clock>,
}

impl<B, R> ThrottleLayer<B, R>
where
    B: 'static,
    R: From<&'static str> + 'static,
{
    /// Layer with all defaults.
    pub fn new() -> Self {
        Self {
            limit: DEFAULT_REQUEST_LIMIT,
            tracker: Arc::new(LocalTracker::default()),
            mapper: Arc::new(mapper::global::<B>()),
            exceeded: Arc::new(|_req: &Request<B>| {
                status_response::<R>(StatusCode::TOO_MANY_REQUESTS)
            }),
            clock: Arc::new(SystemClock),
        }
    }
}

impl<B, R> Default for ThrottleLayer<B, R>
where
    B: 'static,
    R: From<&'static str> + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<B, R> ThrottleLayer<B, R> {
    /// Maximum rate before requests are rejected. 0 restores the default of 100.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = if limit == 0 { DEFAULT_REQUEST_LIMIT } else { limit };
        self
    }

    /// Share `tracker` with this layer; several layers may count into one tracker.
    pub fn with_tracker(mut self, tracker: Arc<dyn LimitTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Choose the bucket for each request. Errors fail closed with a 500.
    pub fn with_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&Request<B>) -> Result<u64, MapperError> + Send + Sync + 'static,
    {
        self.mapper = Arc::new(mapper);
        self
    }

    /// Replace the over-limit response. Rate limit headers are added to whatever it returns.
    pub fn with_exceeded_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Request<B>) -> Response<R> + Send + Sync + 'static,
    {
        self.exceeded = Arc::new(handler);
        self
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Configured limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Tracker backing this layer.
    pub fn tracker(&self) -> &Arc<dyn LimitTracker> {
        &self.tracker
    }
}

impl<B, R> Clone for ThrottleLayer<B, R> {
    fn clone(&self) -> Self {
        Self {
            limit: self.limit,
            tracker: self.tracker.clone(),
            mapper: self.mapper.clone(),
            exceeded: self.exceeded.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<B, R> fmt::Debug for ThrottleLayer<B, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleLayer")
            .field("limit", &self.limit)
            .field("tracker", &self.tracker)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl<S, B, R> Layer<S> for ThrottleLayer<B, R> {
    type Service = ThrottleService<S, B, R>;

    fn layer(&self, service: S) -> Self::Service {
        ThrottleService { inner: service, layer: self.clone() }
    }
}

/// Middleware service produced by [`ThrottleLayer`].
pub struct ThrottleService<S, B, R> {
    inner: S,
    layer: ThrottleLayer<B, R>,
}

impl<S: Clone, B, R> Clone for ThrottleService<S, B, R> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), layer: self.layer.clone() }
    }
}

impl<S: fmt::Debug, B, R> fmt::Debug for ThrottleService<S, B, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleService")
            .field("inner", &self.inner)
            .field("layer", &self.layer)
            .finish()
    }
}

impl<S, B, R> Service<Request<B>> for ThrottleService<S, B, R>
where
    S: Service<Request<B>, Response = Response<R>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    B: Send + 'static,
    R: From<&'static str> + Send + 'static,
{
    type Response = Response<R>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let layer = self.layer.clone();
        // Keep the service that was driven to readiness for this call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let id = match (layer.mapper)(&req) {
                Ok(id) => id,
                Err(err) => {
                    tracing::warn!(error = %err, "throttle: request mapper failed");
                    return Ok(status_response(StatusCode::INTERNAL_SERVER_ERROR));
                }
            };

            let now = layer.clock.now();
            let window = layer.tracker.window_length();

            let rate = match layer.tracker.increment(id, now).await {
                Ok(rate) => rate,
                Err(err) => {
                    tracing::warn!(id, error = %err, "throttle: tracker increment failed");
                    let mut resp = status_response(StatusCode::INTERNAL_SERVER_ERROR);
                    set_retry_after(resp.headers_mut(), window);
                    return Ok(resp);
                }
            };

            let headers = RateLimitHeaders::new(layer.limit, rate, window, now);

            if rate > layer.limit {
                tracing::warn!(id, rate, limit = layer.limit, "throttle: limit exceeded");
                let mut resp = (layer.exceeded)(&req);
                headers.apply(resp.headers_mut());
                return Ok(resp);
            }

            tracing::debug!(id, rate, limit = layer.limit, "throttle: forwarding");
            let mut resp = inner.call(req).await?;
            headers.apply(resp.headers_mut());
            Ok(resp)
        })
    }
}

/// Plain-text response carrying the status's canonical reason as its body.
pub fn status_response<R: From<&'static str>>(status: StatusCode) -> Response<R> {
    let mut resp = Response::new(R::from(status.canonical_reason().unwrap_or("")));
    *resp.status_mut() = status;
    resp.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::io;
    use std::sync::Mutex;
    use std::time::{Duration, UNIX_EPOCH};
    use tower::{service_fn, ServiceExt};
    use tracing_subscriber::fmt::writer::BoxMakeWriter;

    #[derive(Clone)]
    struct SharedWriter(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedWriter {
        type Writer = SharedWriter;
        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    async fn ok(_req: Request<String>) -> Result<Response<String>, std::convert::Infallible> {
        Ok(Response::new("ok".to_string()))
    }

    #[test]
    fn defaults_are_applied() {
        let layer = ThrottleLayer::<String, String>::new();
        assert_eq!(layer.limit(), DEFAULT_REQUEST_LIMIT);
        assert_eq!(layer.tracker().window_length(), DEFAULT_WINDOW_LENGTH);
        assert_eq!(layer.with_limit(0).limit(), DEFAULT_REQUEST_LIMIT);
    }

    #[test]
    fn status_response_uses_reason_phrase() {
        let resp: Response<String> = status_response(StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.body(), "Too Many Requests");
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[tokio::test]
    async fn forwards_under_limit_with_headers() {
        let clock = ManualClock::new(UNIX_EPOCH + Duration::from_secs(1_700_000_010));
        let layer = ThrottleLayer::<String, String>::new().with_limit(2).with_clock(clock);
        let svc = layer.layer(service_fn(ok));

        let resp = svc.oneshot(Request::new(String::new())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body(), "ok");
        assert_eq!(resp.headers()["x-ratelimit-limit"], "2");
        assert_eq!(resp.headers()["x-ratelimit-policy"], "2;w=60");
        assert_eq!(resp.headers()["x-ratelimit-remaining"], "1");
        // 1_700_000_010 is 30s into a 60s window.
        assert_eq!(resp.headers()["x-ratelimit-reset"], "30");
    }

    #[tokio::test]
    async fn rejects_over_limit_with_default_429() {
        let layer = ThrottleLayer::<String, String>::new()
            .with_limit(1)
            .with_clock(ManualClock::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000)));
        let mut svc = layer.layer(service_fn(ok));

        let first = svc.ready().await.unwrap().call(Request::new(String::new())).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = svc.ready().await.unwrap().call(Request::new(String::new())).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.body(), "Too Many Requests");
        assert_eq!(second.headers()["x-ratelimit-remaining"], "-1");
        assert!(second.headers().get(http::header::RETRY_AFTER).is_none());
    }

    #[tokio::test]
    async fn trait_object_tracker_is_shared_between_layers() {
        let clock = ManualClock::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let first = ThrottleLayer::<String, String>::new().with_limit(2).with_clock(clock.clone());
        let second = ThrottleLayer::<String, String>::new()
            .with_limit(2)
            .with_tracker(first.tracker().clone())
            .with_clock(clock.clone());

        let mut a = first.layer(service_fn(ok));
        let mut b = second.layer(service_fn(ok));
        a.ready().await.unwrap().call(Request::new(String::new())).await.unwrap();
        b.ready().await.unwrap().call(Request::new(String::new())).await.unwrap();
        let third = a.ready().await.unwrap().call(Request::new(String::new())).await.unwrap();

        assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.tracker().get(mapper::GLOBAL_ID, clock.now()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn exceeding_the_limit_logs_a_warning() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::fmt()
            .with_writer(BoxMakeWriter::new(SharedWriter(buffer.clone())))
            .with_ansi(false)
            .without_time()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let layer = ThrottleLayer::<String, String>::new()
            .with_limit(1)
            .with_clock(ManualClock::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000)));
        let mut svc = layer.layer(service_fn(ok));
        svc.ready().await.unwrap().call(Request::new(String::new())).await.unwrap();

        let quiet = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(!quiet.contains("limit exceeded"), "no warning while under the limit");

        let resp = svc.ready().await.unwrap().call(Request::new(String::new())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

        let logs = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("WARN"), "warning level expected: {logs}");
        assert!(logs.contains("throttle: limit exceeded"), "exceeded event expected: {logs}");
        assert!(logs.contains("rate=2"), "rate field expected: {logs}");
    }
}
