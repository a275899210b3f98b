//! Retry with exponential backoff for store operations.
//!
//! [`with_retry`] wraps any fallible async store operation and retries on
//! transient connectivity errors. Data-level errors (constraint violations,
//! bad SQL, invalid transitions) are returned immediately — retrying cannot
//! fix them.

use std::future::Future;
use std::time::Duration;

use crate::DbError;

/// An explicit backoff policy: how many attempts to make and the base delay
/// the exponential schedule grows from.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay in seconds; the wait before attempt n+1 is
    /// `base_delay_secs * 2^n` (±25% jitter).
    pub base_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1,
        }
    }
}

/// Computes the backoff delay before the retry following `attempt`
/// (0-indexed), with ±25% jitter and a 60-second cap.
pub(crate) fn backoff_delay(base_delay_secs: u64, attempt: u32) -> Duration {
    const MAX_DELAY_MS: u64 = 60_000;
    let base_ms = base_delay_secs.saturating_mul(1_000);
    let computed = base_ms.saturating_mul(1u64 << attempt.min(10));
    let capped = computed.min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let with_jitter = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
    Duration::from_millis(with_jitter)
}

/// Runs `operation` up to `policy.max_attempts` times, sleeping with
/// exponential backoff between attempts on transient errors.
///
/// Non-transient errors are returned immediately without retrying.
///
/// # Errors
///
/// Returns the last error once attempts are exhausted, or the first
/// non-transient error encountered.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() || attempt + 1 >= attempts {
                    return Err(err);
                }
                let delay = backoff_delay(policy.base_delay_secs, attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient store error — retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
