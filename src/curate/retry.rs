//! Bounded retries with exponential backoff.
//!
//! The policy is failure-agnostic: it retries whatever error the operation
//! returns. Callers that want to distinguish transient from fatal failures
//! do so by returning only the retryable error kind from the closure and
//! propagating everything else outside the retry loop.

use std::fmt;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Retry configuration. Stateless and reusable; every call to
/// [`RetryPolicy::execute`] gets its own attempt counter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    backoff_multiplier: f64,
}

impl RetryPolicy {
    /// `backoff_multiplier` must be at least 1.0 so delays never shrink.
    pub fn new(max_retries: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        assert!(
            backoff_multiplier >= 1.0,
            "backoff multiplier must be >= 1.0, got {}",
            backoff_multiplier
        );
        Self {
            max_retries,
            initial_delay,
            backoff_multiplier,
        }
    }

    /// A single attempt, no delays.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, 1.0)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay preceding attempt `attempt + 1`, i.e. the sleep after the
    /// `attempt`-th failure: `initial_delay * multiplier^(attempt - 1)`.
    /// Attempt numbering starts at 1; the first attempt has no delay.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        debug_assert!(attempt >= 1);
        self.initial_delay
            .mul_f64(self.backoff_multiplier.powi(attempt as i32 - 1))
    }

    /// Run `operation` up to `max_retries + 1` times, sleeping between
    /// attempts. On exhaustion, the last failure is returned annotated with
    /// the number of attempts made. The sleep is local to the calling
    /// worker thread.
    pub fn execute<T, E, F>(&self, what: &str, mut operation: F) -> Result<T, RetryError<E>>
    where
        E: fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        let total_attempts = self.max_retries + 1;
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(error) if attempt < total_attempts => {
                    let delay = self.delay_after_attempt(attempt);
                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {:?}",
                        what, attempt, total_attempts, error, delay
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(error) => {
                    return Err(RetryError {
                        attempts: total_attempts,
                        source: error,
                    })
                }
            }
        }
    }
}

/// The last failure observed after all attempts were exhausted.
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    pub source: E,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed after {} attempt(s): {}", self.attempts, self.source)
    }
}

impl<E: fmt::Display + fmt::Debug> std::error::Error for RetryError<E> {}
