//! Retry with exponential backoff for provider calls
//!
//! Only errors that [`ProviderError::is_retryable`] accepts are retried; a
//! provider-supplied `Retry-After` wins when it is longer than the backoff,
//! but never beyond `max_delay_ms`.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::core::config::RetryConfig;
use crate::core::ProviderError;

/// Backoff for zero-based retry `attempt`.
///
/// `min(max_delay, base_delay * 2^attempt)` scaled by `1 ± jitter`, where
/// `random` is in `[0.0, 1.0)`.
pub fn backoff_delay_ms(config: &RetryConfig, attempt: u32, random: f64) -> u64 {
    let exponential = config
        .base_delay_ms
        .saturating_mul(1u64 << attempt.min(31));
    let capped = exponential.min(config.max_delay_ms);
    let jitter = 1.0 + (random * 2.0 - 1.0) * config.jitter_factor.clamp(0.0, 1.0);
    ((capped as f64) * jitter).round().max(0.0) as u64
}

/// Parse a `Retry-After` header given in seconds
pub fn parse_retry_after(value: &str) -> Option<u64> {
    let seconds: f64 = value.trim().parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| (seconds * 1000.0).round() as u64)
}

/// Run `operation` until it succeeds, fails permanently, or the retry
/// budget runs out. Returns the last error in the latter two cases.
pub async fn call_with_retry<T, F, Fut>(
    config: &RetryConfig,
    provider: &str,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() || attempt >= config.max_retries => return Err(err),
            Err(err) => {
                let backoff = backoff_delay_ms(config, attempt, rand::random::<f64>());
                let delay_ms = err
                    .retry_after_ms()
                    .map_or(backoff, |ra| backoff.max(ra.min(config.max_delay_ms)));
                attempt += 1;
                warn!(
                    provider,
                    attempt,
                    max_retries = config.max_retries,
                    delay_ms,
                    category = err.category(),
                    error = %err,
                    "retrying provider call"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
