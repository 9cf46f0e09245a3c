// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-provider token-bucket rate limiting.
//!
//! Uses the `governor` crate (GCRA algorithm). Each provider client owns one
//! limiter instance shared across every mysis bound to that `{provider, model,
//! temperature}` triple, so the burst budget is a true fleet-wide ceiling
//! rather than per-mysis.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter as GovernorLimiter};

type Limiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Blocks async callers until a token is available, per `{rate, burst}`.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Limiter>,
}

impl RateLimiter {
    /// `rate` requests/second sustained, `burst` allowed instantaneously.
    pub fn new(rate: f64, burst: u32) -> Self {
        let per_minute = (rate * 60.0).round().max(1.0) as u32;
        let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::new(1).unwrap()))
            .allow_burst(NonZeroU32::new(burst.max(1)).unwrap());
        Self { inner: Arc::new(GovernorLimiter::direct(quota)) }
    }

    /// Waits until a token is available. Never errors — `governor`'s
    /// `until_ready` only returns once a slot opens.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }

    /// Non-blocking check; `true` if a call may proceed immediately.
    pub fn check(&self) -> bool {
        self.inner.check().is_ok()
    }
}
