//! Reusable retry policy for upstream calls.
//!
//! Each call site supplies its own retryable-error predicate; the policy
//! owns only the attempt count and the backoff curve.

use std::future::Future;
use std::time::Duration;

use crate::data_source::SourceError;

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Fixed delay between retries.
    Fixed { delay: Duration },
    /// Delay grows with the attempt number: `base * (attempt + 1)`.
    ///
    /// With a 500ms base the waits are 500ms, 1000ms, 1500ms, matching the
    /// venue guidance of backing off harder the longer throttling persists.
    Linear { base: Duration },
}

impl Backoff {
    /// Delay before retrying after the given failed attempt (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Linear { base } => base.saturating_mul(attempt.saturating_add(1)),
        }
    }
}

/// Attempt budget plus backoff curve for one class of upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 0 is treated as 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const fn linear(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear { base },
        }
    }

    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Fixed {
                delay: Duration::ZERO,
            },
        }
    }

    /// Run `op`, retrying while `should_retry` accepts the error and the
    /// attempt budget lasts. The final error is returned unchanged.
    pub async fn run<T, F, Fut, P>(&self, should_retry: P, mut op: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
        P: Fn(&SourceError) -> bool,
    {
        let budget = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    attempt += 1;
                    if attempt >= budget || !should_retry(&error) {
                        return Err(error);
                    }
                    tracing::debug!(
                        attempt,
                        error = %error,
                        "retrying upstream call after backoff"
                    );
                    tokio::time::sleep(self.backoff.delay(attempt - 1)).await;
                }
            }
        }
    }
}
