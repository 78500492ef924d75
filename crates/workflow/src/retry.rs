//! Retry with backoff for a single fallible operation.
//!
//! ## Design
//!
//! - The caller decides which errors are transient (injectable classifier)
//! - Permanent errors fail immediately, without consuming further attempts
//! - Sleeping goes through [`Sleeper`], so tests observe exact delays

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

/// Blocking pause, injectable for deterministic tests.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested pauses without sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pause requested so far, in order.
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn total(&self) -> Duration {
        self.slept().into_iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

/// Retry policy with exponential backoff: `base_delay * 2^attempt_index`.
///
/// There is no delay cap; `max_attempts` bounds the total wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (values below 1 act as 1)
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay to wait after the attempt with this 0-based index failed.
    pub fn delay_for_attempt(&self, attempt_index: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt_index))
    }

    /// Check if another attempt is allowed after `attempts_made` attempts.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts.max(1)
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run
    /// out. Returns the last error on failure.
    ///
    /// `operation` receives the 0-based attempt index.
    pub fn execute<T, E, S, C, Op>(&self, sleeper: &S, is_transient: C, mut operation: Op) -> Result<T, E>
    where
        S: Sleeper + ?Sized,
        C: Fn(&E) -> bool,
        Op: FnMut(u32) -> Result<T, E>,
        E: core::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt_index = 0;

        loop {
            let err = match operation(attempt_index) {
                Ok(value) => {
                    if attempt_index > 0 {
                        debug!(attempt = attempt_index + 1, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let attempts_made = attempt_index + 1;
            if !is_transient(&err) {
                warn!(attempt = attempts_made, error = %err, "permanent failure, not retrying");
                return Err(err);
            }
            if !self.should_retry(attempts_made) {
                warn!(attempts = attempts_made, error = %err, "retries exhausted");
                return Err(err);
            }

            let delay = self.delay_for_attempt(attempt_index);
            warn!(
                attempt = attempts_made,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, retrying"
            );
            sleeper.sleep(delay);
            attempt_index += 1;
        }
    }
}
