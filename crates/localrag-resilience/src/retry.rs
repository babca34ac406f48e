use std::future::Future;
use std::time::Duration;

use localrag_core::config::DependencySettings;
use localrag_core::{Error, ErrorKind, Result};
use tokio::time::sleep;
use tracing::warn;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
    /// Error kinds worth another attempt. `CircuitOpen` is never retried.
    pub retry_on: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(10),
            retry_on: vec![ErrorKind::TransientIo, ErrorKind::TimeoutExceeded],
        }
    }
}

impl From<&DependencySettings> for RetryPolicy {
    fn from(s: &DependencySettings) -> Self {
        Self { max_attempts: s.max_attempts.max(1), min_wait: s.min_wait(), max_wait: s.max_wait(), retry_on: s.retry_on.clone() }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// Wait after failed attempt `attempt` (1-based):
    /// `min_wait * 2^(attempt-1)`, clamped to `[min_wait, max_wait]`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.min_wait.saturating_mul(factor).clamp(self.min_wait, self.max_wait.max(self.min_wait))
    }

    pub fn should_retry(&self, error: &Error) -> bool {
        let kind = error.kind();
        kind != ErrorKind::CircuitOpen && self.retry_on.contains(&kind)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// the attempts run out. The last error is returned unchanged.
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt >= max_attempts || !self.should_retry(&e) => return Err(e),
                Err(e) => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!("attempt {}/{} failed: {}, retrying in {:?}", attempt, max_attempts, e, delay);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
