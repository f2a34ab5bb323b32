//! Retry with exponential backoff for backend reads.
//!
//! Only idempotent reads go through here. Writes fail fast so the caller can
//! roll back whatever it applied optimistically.

use std::future::Future;
use std::time::Duration;

use crate::store::StoreError;

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps the exponential growth).
    pub max_delay_ms: u64,
    /// Jitter factor (0.0 to 1.0) to add randomness to delays.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            jitter_factor: 0.2,
        }
    }

    /// No retries at all; used by tests and the in-memory backend.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_factor: 0.0,
        }
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let capped_delay = base_delay.min(self.max_delay_ms);

        let jitter = if self.jitter_factor > 0.0 {
            let jitter_range = (capped_delay as f64 * self.jitter_factor) as u64;
            if jitter_range > 0 {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .subsec_nanos() as u64;
                now % jitter_range
            } else {
                0
            }
        } else {
            0
        };

        Duration::from_millis(capped_delay + jitter)
    }
}

/// Run `f`, repeating it while it fails with a transient [`StoreError`].
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::debug!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        "Backend read succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if e.is_transient() && attempt < config.max_retries => {
                let delay = config.calculate_delay(attempt);

                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient backend error, retrying with backoff"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt > 0 {
                    tracing::error!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        error = %e,
                        "Backend read failed after all retries"
                    );
                }
                return Err(e);
            }
        }
    }
}
