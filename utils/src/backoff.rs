//! Exponential backoff for retrying transient failures.
//!
//! Used by the ledger client for reads, by the vote orchestrator for Store
//! verification, and by the Store's reconciliation pass.

use std::future::Future;
use std::time::Duration;

/// Exponential backoff schedule with a bounded number of attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the second attempt.
    pub initial: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            initial,
            max,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.initial
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30), 5)
    }
}

/// Run `op` until it succeeds, fails with an error `is_retryable` rejects,
/// or the attempts in `backoff` are used up. Returns the last error.
pub async fn retry<T, E, F, Fut, R>(backoff: &Backoff, is_retryable: R, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < backoff.max_attempts && is_retryable(&e) => {
                let delay = backoff.delay_after(attempt);
                tracing::warn!(attempt, ?delay, error = %e, "retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
