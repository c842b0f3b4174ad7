//! Minimal throttle example: per-client limit of 3 requests per 10 seconds, driven by a
//! manual clock so the sliding window is visible.

use http::{Request, Response};
use sliding_throttle::prelude::*;
use sliding_throttle_cookbook::{per_client_ip, REAL_IP};
use std::convert::Infallible;
use std::time::{Duration, SystemTime};
use tower::{service_fn, Service, ServiceBuilder, ServiceExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG).init();
    println!("=== Sliding Throttle: Basic Example ===\n");

    let clock = ManualClock::new(SystemTime::now());
    let layer = per_client_ip::<String, String>(3, Duration::from_secs(10))?.with_clock(clock.clone());

    let mut svc = ServiceBuilder::new().layer(layer).service(service_fn(|_req: Request<String>| async {
        Ok::<_, Infallible>(Response::new(String::from("hello")))
    }));

    for step in 0..8 {
        let req = Request::builder().header(REAL_IP, "203.0.113.7").body(String::new())?;
        let resp = svc.ready().await?.call(req).await?;
        println!(
            "t+{:>2}s  {}  remaining={:?} reset={:?}",
            step * 2,
            resp.status(),
            resp.headers().get("x-ratelimit-remaining"),
            resp.headers().get("x-ratelimit-reset"),
        );
        clock.advance(Duration::from_secs(2));
    }

    Ok(())
}
