//! Retry policy for provider calls
//!
//! Exponential backoff over retryable errors only; a non-retryable error
//! aborts the loop immediately and is returned as-is.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::{GatewayError, Result};

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(16),
            max_attempts: 4,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based; attempt 1 is the
    /// first retry).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = self.initial_delay.mul_f64(factor);
        delay.min(self.max_delay)
    }

    /// Run `operation` up to `max_attempts` times, backing off between
    /// retryable failures.
    pub async fn execute<T, F, Fut>(&self, route: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = GatewayError::Configuration("retry loop never ran".to_string());

        for attempt in 1..=self.max_attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        route,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retryable provider error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = error;
                }
                Err(error) if !error.is_retryable() => return Err(error),
                Err(error) => last_error = error,
            }
        }

        Err(last_error)
    }
}
