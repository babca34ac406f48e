use std::future::Future;
use std::time::Duration;

use localrag_core::{Error, Result};
use tracing::error;

/// Bound one attempt. On expiry the in-flight future is dropped, which
/// cancels it, and [`Error::TimeoutExceeded`] is returned.
pub async fn bounded<F, T>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(?limit, "call timed out");
            Err(Error::TimeoutExceeded { limit })
        }
    }
}
