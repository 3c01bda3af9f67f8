//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use crate::error::TelaError;

/// Retry policy for idempotent requests.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_max_retries(crate::config::DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    /// Policy allowing `max_retries` retries after the first attempt.
    pub fn from_max_retries(max_retries: u32) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::from_max_retries(0)
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Execute an async operation, retrying errors that report `is_retryable`.
    ///
    /// A `RateLimited` error with a server hint waits at least that long.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, TelaError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TelaError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !err.is_retryable() || attempt >= max_attempts {
                return Err(err);
            }

            // Jitter: 75%-125% of backoff
            let jitter_factor = 0.75 + (rand_factor() * 0.5);
            let mut sleep_for = Duration::from_secs_f64(backoff.as_secs_f64() * jitter_factor);
            if let TelaError::RateLimited {
                retry_after_ms: Some(ms),
            } = &err
            {
                sleep_for = sleep_for.max(Duration::from_millis(*ms)).min(self.max_backoff);
            }

            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = sleep_for.as_millis() as u64,
                error = %err,
                "Retrying after error"
            );
            tokio::time::sleep(sleep_for).await;

            backoff = Duration::from_secs_f64(
                (backoff.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64()),
            );
        }
    }
}

/// Simple pseudo-random factor [0, 1) without pulling in rand crate.
fn rand_factor() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);

    let hash = hasher.finish();
    (hash % 10000) as f64 / 10000.0
}
