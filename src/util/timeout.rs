//! Per-call deadlines for backend sends and user-message generation.

use std::future::Future;
use std::time::Duration;

use crate::error::{ParleyError, Result};

/// Run `call` for at most `limit`.
///
/// An expired limit becomes [`ParleyError::Timeout`], which is retryable, so a
/// session counts a slow backend toward the turn's failure cap instead of
/// ending on it.
pub async fn with_timeout<T>(limit: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(ParleyError::Timeout(millis(limit))))
}

fn millis(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}
