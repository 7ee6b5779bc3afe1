//! Pure retry/backoff, modeled after cargo's `Retry` helper in
//! `sources/registry/http_remote.rs`: a small policy value whose `call`
//! wraps one operation across attempts, with the sleep function injected
//! so tests can run with a deterministic clock.

use std::time::Duration;

/// Exponential backoff policy: `delay(n) = initial * multiplier^(n-1)`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub multiplier: f64,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            multiplier: 2.0,
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait *before* attempt number `attempt` (1-indexed), i.e.
    /// `delay_for(1)` is the wait after the first failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi((attempt - 1) as i32);
        Duration::from_secs_f64(self.initial.as_secs_f64() * factor)
    }
}

/// Injectable sleep so tests don't block wall-clock time.
pub trait Sleeper {
    fn sleep(&self, d: Duration);
}

/// Sleeps for real; used in production.
pub struct RealSleeper;

impl Sleeper for RealSleeper {
    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Records requested durations without blocking; used in tests.
#[derive(Default)]
pub struct RecordingSleeper {
    pub sleeps: std::cell::RefCell<Vec<Duration>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, d: Duration) {
        self.sleeps.borrow_mut().push(d);
    }
}

/// Runs `op` up to `policy.max_retries + 1` times, sleeping per
/// `policy.delay_for` between attempts, and returns the first success or
/// the last error once the budget is exhausted.
pub fn retry<T, E>(
    policy: RetryPolicy,
    sleeper: &dyn Sleeper,
    mut op: impl FnMut(u32) -> std::result::Result<T, E>,
) -> std::result::Result<T, E> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => {
                if attempt > policy.max_retries {
                    return Err(e);
                }
                sleeper.sleep(policy.delay_for(attempt));
            }
        }
    }
}
