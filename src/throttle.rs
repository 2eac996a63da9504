// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-caller request throttling.
//!
//! Each caller owns a token bucket holding up to `burst` tokens and refilled
//! at `rate` tokens per second. A request spends one token; an empty bucket
//! answers 429. Buckets live in a bounded LRU so idle callers are forgotten.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lru::LruCache;

use crate::auth::Caller;
use crate::config::ThrottleConfig;
use crate::error::ApiError;
use crate::state::AppState;

pub const RATE_EXCEEDED_MESSAGE: &str = "You have exceeded your request rate";

/// Number of distinct callers tracked at once.
const DEFAULT_BUCKET_CAPACITY: usize = 10_000;

struct TokenBucket {
    tokens: f64,
    refilled_at: Instant,
}

pub struct Throttle {
    burst: f64,
    rate: f64,
    buckets: Mutex<LruCache<String, TokenBucket>>,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self::with_capacity(config, DEFAULT_BUCKET_CAPACITY)
    }

    pub fn with_capacity(config: ThrottleConfig, capacity: usize) -> Self {
        Self {
            burst: f64::from(config.burst),
            rate: f64::from(config.rate_per_sec),
            buckets: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Spend one token for `key`. Returns `false` when the bucket is empty.
    pub fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_at(key, Instant::now())
    }

    fn try_acquire_at(&self, key: &str, now: Instant) -> bool {
        let Ok(mut buckets) = self.buckets.lock() else {
            return true;
        };
        let burst = self.burst;
        let bucket = buckets.get_or_insert_mut(key.to_string(), || TokenBucket {
            tokens: burst,
            refilled_at: now,
        });

        let elapsed = now.saturating_duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
        bucket.refilled_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Reject requests from callers whose bucket is empty.
///
/// Must run after [`crate::auth::api_key_auth`] so the caller is known.
pub async fn throttle_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = request
        .extensions()
        .get::<Caller>()
        .map(|caller| caller.throttle_key().to_string())
        .unwrap_or_else(|| Caller::default().throttle_key().to_string());

    if state.throttle.try_acquire(&key) {
        next.run(request).await
    } else {
        tracing::warn!(caller = %key, "Request rate exceeded");
        ApiError::too_many_requests(RATE_EXCEEDED_MESSAGE).into_response()
    }
}
