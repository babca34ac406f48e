use std::future::Future;

use localrag_core::Result;
use tracing::warn;

/// Await `fut`; on error, log it and return `fallback(&error)` instead.
pub async fn with_fallback<Fut, T, G>(fut: Fut, fallback: G) -> T
where
    Fut: Future<Output = Result<T>>,
    G: FnOnce(&localrag_core::Error) -> T,
{
    match fut.await {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "using fallback");
            fallback(&e)
        }
    }
}
