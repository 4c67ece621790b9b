//! Bounded retry for rate-limited calls
//!
//! The order engine retries inbox fetch and acknowledgment through this
//! helper when the marketplace answers 429. The budget is deliberately
//! small and the backoff deliberately flat-capped: an inbox run is a
//! frequent, short-lived job, and a marketplace that keeps throttling past
//! five attempts is better left alone until the next scheduled run.
//!
//! The product engine does NOT use this helper — a 429 there ends the
//! batch cleanly at the persisted cursor instead of retrying inline.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use marketlink_core::error::SyncError;
use marketlink_core::ports::marketplace::ApiResponse;

/// Maximum attempts for a rate-limited call
const MAX_ATTEMPTS: u32 = 5;

/// Backoff before re-attempting: min(2×attempt, 8) seconds
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(u64::from((2 * attempt).min(8)))
}

/// Drives an API call through the rate-limit retry budget.
///
/// Any response other than 429 (success or failure alike) is returned to
/// the caller for classification. A transport failure aborts immediately.
///
/// # Errors
/// Returns [`SyncError::RateLimited`] when all attempts were throttled and
/// [`SyncError::Transport`] when a call produced no status at all.
pub async fn with_rate_limit_retry<F, Fut>(
    operation: &str,
    call: F,
) -> Result<ApiResponse, SyncError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<ApiResponse>>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let response = call()
            .await
            .map_err(|e| SyncError::Transport(format!("{operation}: {e:#}")))?;

        if !response.is_rate_limited() {
            if attempt > 1 {
                info!(operation, attempt, "Call succeeded after rate-limit retry");
            }
            return Ok(response);
        }

        if attempt == MAX_ATTEMPTS {
            break;
        }

        let delay = backoff_delay(attempt);
        warn!(
            operation,
            attempt,
            delay_secs = delay.as_secs(),
            "Rate limited, backing off"
        );
        tokio::time::sleep(delay).await;
    }

    Err(SyncError::RateLimited {
        context: format!("{operation}: retry budget of {MAX_ATTEMPTS} attempts exhausted"),
    })
}
