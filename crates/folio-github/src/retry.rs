//! Bounded retry with exponential back-off for upstream calls.
//!
//! [`RetryPolicy`] carries the whole schedule (attempt cap, delays, total
//! sleep budget) so it can be inspected and tested without a network.
//! [`retry_with_backoff`] drives an async operation with it: transient errors
//! (network failures, 5xx, rate limiting) are retried; everything else is
//! returned immediately.

use std::future::Future;
use std::time::Duration;

use folio_core::{sanitize_for_log, UpstreamConfig};

use crate::error::GithubError;

/// Retry schedule for one logical upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Cap on a single computed back-off delay. Rate-limit waits signaled by
    /// upstream are honored as-is and only bounded by `budget`.
    pub max_delay: Duration,
    /// Total time the call may spend sleeping between attempts.
    pub budget: Duration,
    /// Apply ±25 % jitter to computed back-off delays.
    pub jitter: bool,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
            budget: Duration::from_secs(config.retry_budget_secs),
            jitter: true,
        }
    }

    /// A single attempt, no retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            budget: Duration::ZERO,
            jitter: false,
        }
    }

    /// Deterministic back-off before retry number `retry` (1-based):
    /// `base_delay × 2^(retry-1)`, capped at `max_delay`.
    #[must_use]
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn delay_before(&self, retry: u32, err: &GithubError) -> Duration {
        if let GithubError::RateLimited { retry_after_secs } = err {
            return Duration::from_secs(*retry_after_secs);
        }
        let delay = self.backoff_delay(retry);
        if self.jitter {
            delay.mul_f64(rand::random::<f64>() * 0.5 + 0.75)
        } else {
            delay
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            budget: Duration::from_secs(120),
            jitter: true,
        }
    }
}

/// Returns `true` for errors that are worth retrying after a delay.
///
/// **Retriable:** timeouts and connection failures, HTTP 5xx, rate limiting.
///
/// **Not retriable:** validation failures, 4xx rejections, malformed bodies,
/// configuration errors.
pub(crate) fn is_retriable(err: &GithubError) -> bool {
    match err {
        GithubError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        GithubError::RateLimited { .. } | GithubError::ServerError { .. } => true,
        GithubError::InvalidEndpoint { .. }
        | GithubError::Rejected { .. }
        | GithubError::Unavailable { .. }
        | GithubError::Deserialize { .. }
        | GithubError::InvalidBaseUrl { .. } => false,
    }
}

/// Runs `operation` under `policy`.
///
/// Gives up with [`GithubError::Unavailable`] once `max_retries` is reached or
/// the next sleep would push total sleeping past `budget`. Non-retriable
/// errors are returned unchanged on first occurrence.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    endpoint: &str,
    mut operation: F,
) -> Result<T, GithubError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GithubError>>,
{
    let mut retries = 0u32;
    let mut slept = Duration::ZERO;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retriable(&err) => return Err(err),
            Err(err) => err,
        };

        let attempts = retries + 1;
        if retries >= policy.max_retries {
            return Err(exhausted(attempts, err));
        }

        let delay = policy.delay_before(retries + 1, &err);
        if slept.saturating_add(delay) > policy.budget {
            tracing::warn!(
                endpoint = %sanitize_for_log(endpoint),
                attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "upstream retry budget exhausted"
            );
            return Err(exhausted(attempts, err));
        }

        retries += 1;
        tracing::warn!(
            endpoint = %sanitize_for_log(endpoint),
            attempt = retries,
            max_retries = policy.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient upstream error, retrying after back-off"
        );
        tokio::time::sleep(delay).await;
        slept += delay;
    }
}

fn exhausted(attempts: u32, err: GithubError) -> GithubError {
    let last_error = match err {
        GithubError::Http(e) => e.without_url().to_string(),
        other => other.to_string(),
    };
    GithubError::Unavailable {
        attempts,
        last_error,
    }
}
