//! Bounded retry for provider calls.
//!
//! A reasoner builds one [`RetryPolicy`] from its `[performance]` section and
//! lends it to every stage that retries. Quick respond hands a whole call to
//! [`RetryPolicy::run`]; the solver keeps its own per-step loop (it records
//! every attempt in the scratchpad) and only borrows [`RetryPolicy::attempts`]
//! and [`RetryPolicy::backoff`].
//!
//! ```rust
//! use reason_orchestrator::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<&'static str, String> {
//! let policy = RetryPolicy::new(3, Duration::from_millis(100));
//! let answer = policy.run("quick", || async { Ok::<_, String>("4") }).await?;
//! # Ok(answer)
//! # }
//! ```

use crate::config::PerformanceConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on any single wait between attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Attempt budget plus a doubling backoff schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: usize,
    base_backoff: Duration,
}

impl RetryPolicy {
    /// `attempts` total tries (zero is read as one), waiting `base_backoff`
    /// after the first failure and doubling from there.
    pub fn new(attempts: usize, base_backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_backoff,
        }
    }

    /// Policy from `performance.max_retries` and `performance.retry_backoff_ms`.
    pub fn from_config(config: &PerformanceConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    /// Total tries per call, at least one.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Wait after the `failed`-th failure (1-based): `base * 2^(failed-1)`,
    /// capped at [`MAX_BACKOFF`].
    pub fn backoff(&self, failed: usize) -> Duration {
        let shift = u32::try_from(failed.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        self.base_backoff
            .saturating_mul(1u32 << shift)
            .min(MAX_BACKOFF)
    }

    /// Run `op` until it succeeds or the budget is spent. `stage` labels the
    /// log events.
    ///
    /// # Errors
    ///
    /// The error of the final attempt.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub async fn run<F, Fut, T, E>(&self, stage: &'static str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut failed = 0;
        loop {
            match op().await {
                Ok(value) => {
                    if failed > 0 {
                        debug!(stage, failed, "call recovered after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    failed += 1;
                    if failed >= self.attempts {
                        warn!(stage, attempts = failed, error = %e, "retry budget exhausted");
                        return Err(e);
                    }
                    let wait = self.backoff(failed);
                    debug!(stage, failed, wait_ms = wait.as_millis() as u64, error = %e, "call failed; backing off");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}
