use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source injected into expiry-sensitive components.
///
/// Production code uses [`SystemClock`]; tests drive expiry deterministically
/// with [`ManualClock`] instead of sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-behind-monotonic clock backed by `Instant::now`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Test clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    advanced: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            base: Instant::now(),
            advanced: Mutex::new(Duration::ZERO),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        let mut advanced = self
            .advanced
            .lock()
            .expect("manual clock lock is not poisoned");
        *advanced += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let advanced = self
            .advanced
            .lock()
            .expect("manual clock lock is not poisoned");
        self.base + *advanced
    }
}
