//! Bounded exponential-backoff retry shared by every adapter

use std::future::Future;
use std::time::Duration;

use axon_config::RetryConfig;

use super::AdapterError;

/// Bounded retry schedule for transient adapter failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            backoff_factor: config.backoff_factor,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

/// Run `op` until it succeeds, fails terminally, or exhausts the policy
///
/// Only failures whose [`AdapterError::is_retryable`] holds are retried;
/// authentication and quota failures surface immediately.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    provider: &str,
    mut op: F,
) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() && attempt < policy.max_attempts => {
                tracing::debug!(
                    provider,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                    "retrying after transient adapter failure"
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.mul_f64(policy.backoff_factor);
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
