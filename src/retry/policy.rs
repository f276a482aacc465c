//! Retry Policy Module
//!
//! Bounds how many times a unit of work (a disbursement page, an issuance
//! entity) is attempted and how long to wait between attempts.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Delay shape between attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    /// Wait the same duration after every failure
    Fixed(Duration),
    /// Start at `initial`, double after every failure, never exceed `max`
    Exponential { initial: Duration, max: Duration },
}

/// Bounded retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    max_attempts: u32,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    /// Three attempts, five seconds apart
    fn default() -> Self {
        Self::new(3, Backoff::Fixed(Duration::from_secs(5)))
    }
}

impl RetryPolicy {
    /// Creates a new policy
    ///
    /// `max_attempts` is clamped to at least one so a unit of work always
    /// runs once.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Fixed-delay policy
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, Backoff::Fixed(delay))
    }

    /// Policy that never retries
    pub fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after `failures` failed attempts (1-based)
    pub fn delay_for(&self, failures: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential { initial, max } => {
                let shift = failures.saturating_sub(1).min(31);
                initial.saturating_mul(1u32 << shift).min(*max)
            }
        }
    }

    /// Whether another attempt is allowed after `failures` failures
    pub fn allows_retry(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }

    /// Wait out the delay that follows `failures` failed attempts
    pub async fn wait(&self, failures: u32) {
        let delay = self.delay_for(failures);
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    /// Run `op` until it succeeds or the attempts are used up
    ///
    /// Returns the last error once the policy is exhausted.
    pub async fn run<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.run_while(label, op, |_| true).await
    }

    /// Like `run`, but only errors for which `retryable` holds are retried
    ///
    /// Any other error is returned straight away without waiting.
    pub async fn run_while<T, E, F, Fut, P>(&self, label: &str, mut op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut failures = 0;
        loop {
            match op(failures + 1).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    failures += 1;
                    // Permanent errors would fail the same way on every attempt
                    if !retryable(&e) {
                        warn!("{} failed permanently on attempt {}: {}", label, failures, e);
                        return Err(e);
                    }
                    if !self.allows_retry(failures) {
                        warn!("{} failed after {} attempt(s): {}", label, failures, e);
                        return Err(e);
                    }
                    warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        label,
                        failures,
                        self.max_attempts,
                        e,
                        self.delay_for(failures)
                    );
                    self.wait(failures).await;
                }
            }
        }
    }
}
