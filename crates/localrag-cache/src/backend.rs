use std::time::Duration;

use async_trait::async_trait;
use localrag_core::Result;

/// Key-value store with per-entry expiry. Bulk deletes must be atomic
/// with respect to other operations on the same backend.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn ping(&self) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool>;
    /// Delete every key matching a glob pattern, returning the count.
    async fn delete_matching(&self, pattern: &str) -> Result<usize>;
    async fn flush(&self) -> Result<()>;
}
