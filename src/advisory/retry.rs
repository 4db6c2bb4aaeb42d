//! Shared retry policy for advisory sources.
//!
//! Both sources get 3 attempts with exponential backoff bounded between
//! 250 ms and 4 s. The hard per-attempt timeout lives on each source's
//! `reqwest::Client`.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::error::ScanError;

const MIN_DELAY: Duration = Duration::from_millis(250);
const MAX_DELAY: Duration = Duration::from_secs(4);
/// Retries after the first attempt; 3 attempts total.
const MAX_RETRIES: usize = 2;

/// Per-attempt HTTP timeout applied to both source clients.
pub(crate) const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

fn backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(MIN_DELAY)
        .with_max_delay(MAX_DELAY)
        .with_max_times(MAX_RETRIES)
}

/// Runs `op` under the shared policy, retrying transient advisory-source
/// failures only.
pub(crate) async fn with_retry<F, Fut, T>(op: F) -> Result<T, ScanError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScanError>>,
{
    op.retry(backoff()).when(is_transient).await
}

fn is_transient(err: &ScanError) -> bool {
    matches!(err, ScanError::AdvisorySource { .. })
}
