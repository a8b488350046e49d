//! Adapter-side request pacing.
//!
//! Single-symbol open-interest lookups fan out per screened row; a venue
//! that punishes bursts gets a direct rate limiter in front of that path,
//! which in turn lets its enrichment run sequentially without extra pool
//! plumbing.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// In-process rate limiter shared by one adapter's metered calls.
#[derive(Clone)]
pub struct SelfThrottle {
    limiter: Arc<DirectRateLimiter>,
}

impl SelfThrottle {
    /// Allow up to `limit` calls per `window`, bursting to the full quota.
    pub fn new(window: Duration, limit: u32) -> Self {
        let quota = quota_from_window(window, limit);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Wait until the next call fits the quota.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    /// Non-blocking probe used where waiting is not an option.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

fn quota_from_window(window: Duration, limit: u32) -> Quota {
    let limit = NonZeroU32::new(limit.max(1)).unwrap_or(NonZeroU32::MIN);
    let per_cell = window
        .checked_div(limit.get())
        .filter(|d| !d.is_zero())
        .unwrap_or(Duration::from_millis(1));
    Quota::with_period(per_cell)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(limit)
}
