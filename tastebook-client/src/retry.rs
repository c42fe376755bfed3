//! Resilient execution of remote operations
//!
//! Every call to the backend goes through [`execute_with_retry`]: each
//! attempt races a per-attempt timeout, transient failures are retried with
//! exponential backoff plus jitter, and anything else is returned as-is.
//!
//! The attempt counter lives inside each call, so concurrent executions
//! never observe each other's progress.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

/// Retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Backoff base
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Per-attempt timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Upper bound (exclusive) of the random jitter added to each delay
pub const DEFAULT_MAX_JITTER_MS: u64 = 200;

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts beyond the first try
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Applied to every attempt individually
    pub timeout: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_jitter: Duration::from_millis(DEFAULT_MAX_JITTER_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, timeout: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            timeout,
            ..Default::default()
        }
    }

    /// Single attempt, still bounded by the timeout
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Total attempts including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Deterministic part of the delay before retry `attempt` (0-based):
    /// `base * 2^attempt`
    pub fn backoff_floor(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Delay before retry `attempt`, jitter included
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_floor(attempt).saturating_add(jitter(self.max_jitter))
    }

    /// Upper bound on the wall-clock time of one execution
    pub fn worst_case_duration(&self) -> Duration {
        let attempts = self.timeout.saturating_mul(self.max_attempts());
        (0..self.max_retries).fold(attempts, |total, attempt| {
            total
                .saturating_add(self.backoff_floor(attempt))
                .saturating_add(self.max_jitter)
        })
    }
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

/// Run `operation` under `policy`.
///
/// Returns the first success. A non-retryable error is returned after the
/// attempt that produced it; a retryable one is returned once all attempts
/// are spent. The error is never wrapped.
pub async fn execute_with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        let outcome = match tokio::time::timeout(policy.timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(policy.timeout)),
        };

        let error = match outcome {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(attempts = attempt + 1, "Remote operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            tracing::debug!(attempt = attempt + 1, error = %error, "Remote operation failed permanently");
            return Err(error);
        }

        if attempt >= policy.max_retries {
            tracing::warn!(
                attempts = attempt + 1,
                error = %error,
                "Remote operation failed, retries exhausted"
            );
            return Err(error);
        }

        let delay = policy.backoff_delay(attempt);
        tracing::warn!(
            attempt = attempt + 1,
            max_attempts = policy.max_attempts(),
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Remote operation failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Cheap, copyable handle carrying a [`RetryPolicy`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<T, F, Fut>(&self, operation: F) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        execute_with_retry(&self.policy, operation).await
    }
}
