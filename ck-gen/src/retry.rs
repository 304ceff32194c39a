//! Bounded exponential-backoff retry for generation calls.
//!
//! Only rate-limit errors are retried (see [`crate::error::is_rate_limited`]);
//! anything else propagates on the first failure. No jitter and no cap on
//! the wait: the policy is bounded only by the attempt count.

use std::future::Future;
use std::time::Duration;

use tokio_retry::RetryIf;

use crate::error::{is_rate_limited, GenError};

pub const MAX_ATTEMPTS: usize = 3;
pub const BASE_DELAY: Duration = Duration::from_millis(2000);

/// Waits of `base * 2^attempt`, one per retry (so one fewer than the
/// attempt count). Pulling the next wait means a retry is happening, which
/// is the right moment for the diagnostic.
fn backoff(base_delay: Duration, max_attempts: usize) -> impl Iterator<Item = Duration> {
    (0u32..)
        .map(move |attempt| base_delay * 2u32.pow(attempt))
        .inspect(|wait| tracing::warn!("Rate limited by the model API, retrying in {:?}", wait))
        .take(max_attempts.saturating_sub(1))
}

/// Run `op` up to [`MAX_ATTEMPTS`] times, sleeping with exponential backoff
/// between rate-limited failures, and return the first success or the last
/// error.
pub async fn retry_with_backoff<T, F, Fut>(op: F) -> Result<T, GenError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenError>>,
{
    retry_with_schedule(op, MAX_ATTEMPTS, BASE_DELAY).await
}

pub(crate) async fn retry_with_schedule<T, F, Fut>(
    op: F,
    max_attempts: usize,
    base_delay: Duration,
) -> Result<T, GenError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenError>>,
{
    RetryIf::spawn(backoff(base_delay, max_attempts), op, is_rate_limited).await
}
