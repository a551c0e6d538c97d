/*!
 * Retry with exponential backoff and jitter.
 *
 * Backoff sleeps race the run's cancellation token, so cancelling a run
 * never waits out a delay.
 */

use log::warn;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

use super::cancel::CancellationToken;
use crate::app_config::TranslationCommonConfig;
use crate::errors::ProviderError;

/// Bounded retry schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first, at least 1
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound for the exponential part of the delay
    pub max_delay: Duration,
    /// Upper bound (exclusive) of the random extra delay
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Build from the common translation settings.
    ///
    /// `retry_count` counts retries, so it is one less than the attempts.
    pub fn from_config(common: &TranslationCommonConfig) -> Self {
        Self {
            max_attempts: common.retry_count.saturating_add(1).max(1),
            base_delay: Duration::from_millis(common.retry_backoff_ms),
            max_delay: Duration::from_millis(common.retry_max_backoff_ms.max(common.retry_backoff_ms)),
            jitter: Duration::from_millis(common.retry_jitter_ms),
        }
    }

    /// A policy that never sleeps, for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` is 1-based
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);

        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..jitter_ms))
        } else {
            Duration::ZERO
        };

        exponential + jitter
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error,
/// runs out of attempts, or the token is cancelled.
///
/// The closure receives the 1-based attempt number.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 1;
    loop {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !error.is_retryable() || attempt >= policy.max_attempts {
            return Err(error);
        }

        let delay = policy.delay_for(attempt);
        warn!(
            "Attempt {}/{} failed: {}. Retrying in {:?}",
            attempt, policy.max_attempts, error, delay
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
