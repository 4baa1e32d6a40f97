use std::{future::Future, time::Duration};

use crate::{client::ClientError, observability::log_warn};

/// Bounded exponential backoff for transient remote faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) initial_backoff: Duration,
    pub(crate) max_backoff: Duration,
    pub(crate) multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Attempts including the first; at least 1.
    pub fn max_attempts(self, max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            ..self
        }
    }

    /// Delay before the first retry.
    pub fn initial_backoff(self, initial_backoff: Duration) -> Self {
        RetryPolicy {
            initial_backoff,
            ..self
        }
    }

    /// Cap on any single delay.
    pub fn max_backoff(self, max_backoff: Duration) -> Self {
        RetryPolicy {
            max_backoff,
            ..self
        }
    }

    /// Growth factor between consecutive delays; at least 1.
    pub fn multiplier(self, multiplier: u32) -> Self {
        RetryPolicy {
            multiplier: multiplier.max(1),
            ..self
        }
    }

    /// Configured attempt limit.
    pub fn attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (0-based).
    pub(crate) fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `op` until it succeeds, fails non-transiently, or attempts run out.
    ///
    /// On failure returns the last error and the number of attempts made.
    pub(crate) async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        mut op: F,
    ) -> Result<T, (ClientError, u32)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt - 1);
                    log_warn!(
                        component = "retry",
                        event = "transient_failure",
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err((err, attempt)),
            }
        }
    }
}
