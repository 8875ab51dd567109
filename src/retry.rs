//! Bounded retry with exponential backoff and jitter.
//!
//! Every retry loop here terminates: either the attempt budget or the overall
//! timeout runs out, and the caller gets [`AppError::Timeout`]. The timeout
//! also bounds an attempt that is still in flight.

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{error, warn};

use crate::error::{AppError, AppResult};

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one (must be >= 1)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failure
    pub backoff_multiplier: f64,
    /// Overall deadline measured from the first attempt
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(15),
            backoff_multiplier: 2.0,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or the budget is spent.
///
/// Only errors for which [`AppError::is_transient`] holds are retried; any
/// other error is returned as-is on the spot.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let start = Instant::now();
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let remaining = config.timeout.saturating_sub(start.elapsed());
        let err = match tokio::time::timeout(remaining, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if !e.is_transient() => return Err(e),
            Ok(Err(e)) => e,
            Err(_) => {
                error!(
                    operation = %operation_name,
                    attempt = attempt,
                    timeout_ms = config.timeout.as_millis() as u64,
                    "Operation did not finish before the deadline"
                );
                return Err(AppError::Timeout(format!(
                    "{} after {:?} (attempt {} still running)",
                    operation_name, config.timeout, attempt
                )));
            }
        };

        let elapsed = start.elapsed();
        if attempt >= max_attempts || elapsed >= config.timeout {
            error!(
                operation = %operation_name,
                attempt = attempt,
                error = %err,
                "Operation failed after max retries"
            );
            return Err(AppError::Timeout(format!(
                "{} after {} attempts: {}",
                operation_name, attempt, err
            )));
        }

        // Jitter 0.5x..1.5x, never sleeping past the deadline
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        let remaining = config.timeout.saturating_sub(elapsed);
        let sleep_for = Duration::from_secs_f64(delay.as_secs_f64() * jitter).min(remaining);

        warn!(
            operation = %operation_name,
            attempt = attempt,
            error = %err,
            delay_ms = sleep_for.as_millis() as u64,
            "Operation failed, retrying"
        );

        tokio::time::sleep(sleep_for).await;

        delay = Duration::from_secs_f64(
            (delay.as_secs_f64() * config.backoff_multiplier).min(config.max_delay.as_secs_f64()),
        );
    }
}
