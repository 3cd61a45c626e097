//! Bounded retry with exponential backoff.
//!
//! [`RetryPolicy::run`] is generic over the wrapped operation: callers pass a
//! closure that builds a fresh future per attempt, capturing whatever
//! arguments the operation needs.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};

/// How many times to try an operation and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (always at least 1).
    pub tries: u32,
    /// Delay after the first failure; doubled after every further failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// Create a policy; `tries` below 1 is raised to 1.
    pub fn new(tries: u32, base_delay: Duration) -> Self {
        Self {
            tries: tries.max(1),
            base_delay,
        }
    }

    /// Delay slept after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds or the attempts are used up.
    ///
    /// Returns the first success immediately. Each failure is logged and
    /// followed by a sleep of [`delay_after`](Self::delay_after). There is
    /// no sleep after the final attempt; its error is returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt >= self.tries => {
                    error!(attempts = attempt, error = %err, "retries exhausted");
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        attempt,
                        remaining = self.tries - attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
