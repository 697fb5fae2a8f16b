use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

struct Inner {
    epoch: Instant,
    window: AtomicU64,
    count: AtomicU32,
}

/// Fixed one-second window limiter, shared per router.
#[derive(Clone)]
pub struct RateLimiter {
    rps: u32,
    inner: Arc<Inner>,
}

impl RateLimiter {
    pub fn new(rps: u32) -> Self {
        Self {
            rps: rps.max(1),
            inner: Arc::new(Inner {
                epoch: Instant::now(),
                window: AtomicU64::new(0),
                count: AtomicU32::new(0),
            }),
        }
    }

    fn try_acquire(&self) -> bool {
        let current = self.inner.epoch.elapsed().as_secs();
        let seen = self.inner.window.load(Ordering::Acquire);
        if current != seen
            && self
                .inner
                .window
                .compare_exchange(seen, current, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.inner.count.store(0, Ordering::Release);
        }
        self.inner.count.fetch_add(1, Ordering::AcqRel) < self.rps
    }
}

pub async fn rps_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !limiter.try_acquire() {
        return (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded").into_response();
    }
    next.run(req).await
}
