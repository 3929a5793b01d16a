//! Retry logic.
//!
//! # Responsibilities
//! - Drive up to `max_attempts` origin attempts
//! - Sleep `base * 2^i` between attempts, never after the last one
//! - Stop immediately on outcomes that retrying cannot change
//!
//! # Design Decisions
//! - Retryability is a property of the outcome tag, decided by the fetcher
//! - Only `Retryable` outcomes trigger another attempt
//! - Running out of attempts is its own error (`ExhaustedRetries`)

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::origin::{CardImage, FetchError, FetchOutcome};
use crate::resilience::backoff::calculate_backoff;

/// Retry schedule for origin fetches.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep inserted after the failed attempt `attempt_index`.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        calculate_backoff(attempt_index, self.base_delay, self.max_delay)
    }

    /// Run `attempt` until it yields a final outcome or attempts run out.
    ///
    /// `attempt` receives the 0-based attempt index.
    pub async fn run<F, Fut>(&self, key: &str, mut attempt: F) -> Result<CardImage, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = FetchOutcome>,
    {
        let mut last_reason = String::new();

        for index in 0..self.max_attempts {
            let outcome = attempt(index).await;
            metrics::record_origin_attempt(outcome.label());

            match outcome {
                FetchOutcome::Success(image) => return Ok(image),
                FetchOutcome::NotFound => return Err(FetchError::NotFound),
                FetchOutcome::Terminal { reason } => {
                    tracing::warn!(key = %key, attempt = index + 1, reason = %reason, "Origin returned terminal error");
                    return Err(FetchError::Terminal { reason });
                }
                FetchOutcome::Retryable { reason } => {
                    if index + 1 < self.max_attempts {
                        let delay = self.delay_for(index);
                        tracing::info!(key = %key, attempt = index + 1, delay = ?delay, reason = %reason, "Retrying origin fetch");
                        tokio::time::sleep(delay).await;
                    } else {
                        tracing::warn!(key = %key, attempt = index + 1, reason = %reason, "Origin fetch failed, no attempts left");
                    }
                    last_reason = reason;
                }
            }
        }

        Err(FetchError::ExhaustedRetries {
            attempts: self.max_attempts,
            last_reason,
        })
    }
}
