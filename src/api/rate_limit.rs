//! Per-source-IP rate limiting for mutation endpoints (spec §6).
//!
//! A plain token bucket keyed by `IpAddr`, grounded on the same
//! `DashMap`-per-key-state idiom used throughout the core (`CostController`,
//! `PolicyEngine`). No external crate pulls its weight for something this
//! small.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;

use super::types::ApiError;
use super::AppState;
use crate::clock::Context;

struct Bucket {
    tokens: f64,
    last_refill: chrono::DateTime<chrono::Utc>,
}

pub struct RateLimiter {
    buckets: DashMap<IpAddr, Bucket>,
    capacity: f64,
    refill_per_sec: f64,
    ctx: Context,
}

impl RateLimiter {
    pub fn new(capacity: f64, refill_per_sec: f64, ctx: Context) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity,
            refill_per_sec,
            ctx,
        }
    }

    /// Returns `true` if the request is allowed, consuming one token.
    pub fn allow(&self, ip: IpAddr) -> bool {
        let now = self.ctx.now();
        let mut bucket = self.buckets.entry(ip).or_insert_with(|| Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = (now - bucket.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub async fn enforce_rate_limit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.rate_limiter.allow(addr.ip()) {
        return Err(ApiError::rate_limited("rate limit exceeded for this source"));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Context;

    #[test]
    fn allows_up_to_capacity_then_blocks() {
        let limiter = RateLimiter::new(2.0, 0.0, Context::system());
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        assert!(limiter.allow(ip));
        assert!(limiter.allow(ip));
        assert!(!limiter.allow(ip));
    }

    #[test]
    fn separate_ips_have_separate_buckets() {
        let limiter = RateLimiter::new(1.0, 0.0, Context::system());
        let a: IpAddr = "127.0.0.1".parse().unwrap();
        let b: IpAddr = "127.0.0.2".parse().unwrap();

        assert!(limiter.allow(a));
        assert!(limiter.allow(b));
        assert!(!limiter.allow(a));
    }
}
