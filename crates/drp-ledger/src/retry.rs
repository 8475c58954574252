use std::time::Duration;

use rand::Rng;
use tracing::debug;

use drp_core::constants::{
    RETRY_ATTEMPTS, RETRY_BACKOFF_FACTOR, RETRY_BASE_DELAY_MS, RETRY_JITTER_PCT,
};
use drp_core::DrpError;

/// Run an idempotent read with exponential backoff.
///
/// Infrastructure failures are retried 3 times at 100 → 400 → 1600 ms with
/// ±25% jitter; every other error kind surfaces immediately. Writes must
/// not go through here: a non-idempotent operation fails fast and the
/// caller retries at its own discretion.
pub async fn retry_read<T, F>(label: &str, mut op: F) -> Result<T, DrpError>
where
    F: FnMut() -> Result<T, DrpError>,
{
    let mut delay_ms = RETRY_BASE_DELAY_MS;
    let mut last_err = None;

    for attempt in 1..=RETRY_ATTEMPTS {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < RETRY_ATTEMPTS => {
                let jitter_span = delay_ms * RETRY_JITTER_PCT / 100;
                let jittered = rand::thread_rng()
                    .gen_range(delay_ms.saturating_sub(jitter_span)..=delay_ms + jitter_span);
                debug!(label, attempt, delay_ms = jittered, error = %e, "retrying idempotent read");
                tokio::time::sleep(Duration::from_millis(jittered)).await;
                delay_ms *= RETRY_BACKOFF_FACTOR;
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err
        .unwrap_or_else(|| DrpError::InfrastructureUnavailable(format!("{label}: retries exhausted"))))
}
