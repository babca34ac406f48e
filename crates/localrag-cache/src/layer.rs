use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use localrag_core::traits::Embedder;
use localrag_core::Result;
use localrag_resilience::Resilience;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::CacheBackend;
use crate::memory::MemoryBackend;
use crate::stats::{CacheCategory, CacheStats, CategoryStats};

/// Strategy that produces a value on a cache miss. Any `FnOnce()`
/// returning a future of `Result<T>` is a `Compute`.
pub trait Compute<T> {
    type Fut: Future<Output = Result<T>>;
    fn compute(self) -> Self::Fut;
}

impl<F, Fut, T> Compute<T> for F
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    type Fut = Fut;
    fn compute(self) -> Fut { self() }
}

/// `prefix:` followed by the first 16 hex digits of the blake3 digest of
/// `data`.
pub fn cache_key(prefix: &str, data: &str) -> String {
    let digest = blake3::hash(data.as_bytes()).to_hex();
    format!("{prefix}:{}", &digest[..16])
}

pub struct CacheLayer {
    backend: Arc<dyn CacheBackend>,
    guard: Option<Resilience>,
    enabled: bool,
    initialized: AtomicBool,
    stats: CacheStats,
}

impl CacheLayer {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend, guard: None, enabled: true, initialized: AtomicBool::new(false), stats: CacheStats::default() }
    }

    /// In-process cache, for single-node use and tests.
    pub fn in_memory() -> Self { Self::new(Arc::new(MemoryBackend::new())) }

    /// A layer that never stores anything and never counts.
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::in_memory() }
    }

    /// Route every backend call through `guard` (breaker and timeout).
    #[must_use]
    pub fn with_guard(mut self, guard: Resilience) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Check the backend is reachable. Safe to call repeatedly; after the
    /// first success it returns immediately. Until it succeeds the layer
    /// behaves as an always-missing cache.
    pub async fn initialize(&self) -> Result<()> {
        if !self.enabled || self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let backend = &self.backend;
        self.guarded(move || backend.ping()).await?;
        if !self.initialized.swap(true, Ordering::AcqRel) {
            info!("cache backend connected");
        }
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.enabled && self.initialized.load(Ordering::Acquire)
    }

    async fn guarded<F, Fut, T>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match &self.guard {
            Some(guard) => guard.call(op).await,
            None => op().await,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str, category: CacheCategory) -> Option<T> {
        if !self.is_ready() {
            return None;
        }
        let backend = &self.backend;
        match self.guarded(move || backend.get(key)).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    self.stats.record_hit(category);
                    debug!(key, "cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(key, error = %e, "undecodable cache entry, treating as miss");
                    self.stats.record_miss(category);
                    None
                }
            },
            Ok(None) => {
                self.stats.record_miss(category);
                debug!(key, "cache miss");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "cache get failed");
                None
            }
        }
    }

    /// Store `value` for `ttl`. Returns whether it was stored.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        if !self.is_ready() {
            return false;
        }
        let bytes = match serde_json::to_vec(value) {
            Ok(b) => b,
            Err(e) => {
                warn!(key, error = %e, "cache value not serializable");
                return false;
            }
        };
        let backend = &self.backend;
        match self.guarded(move || backend.set(key, bytes.clone(), ttl)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "cache set failed");
                false
            }
        }
    }

    /// Return the cached value for `key`, or run `compute`, cache its
    /// result for `ttl` and return it. Compute errors are not cached.
    pub async fn get_or_compute<T, C>(&self, key: &str, compute: C, ttl: Duration, category: CacheCategory) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        C: Compute<T>,
    {
        if let Some(hit) = self.get(key, category).await {
            return Ok(hit);
        }
        let value = compute.compute().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    pub async fn invalidate(&self, key: &str) -> bool {
        if !self.is_ready() {
            return false;
        }
        let backend = &self.backend;
        match self.guarded(move || backend.delete(key)).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!(key, error = %e, "cache delete failed");
                false
            }
        }
    }

    /// Delete every key matching the glob `pattern`, returning how many
    /// were removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        if !self.is_ready() {
            return 0;
        }
        let backend = &self.backend;
        match self.guarded(move || backend.delete_matching(pattern)).await {
            Ok(n) => {
                info!(pattern, removed = n, "cache entries invalidated");
                n
            }
            Err(e) => {
                warn!(pattern, error = %e, "cache pattern delete failed");
                0
            }
        }
    }

    /// Drop every entry and reset the statistics.
    pub async fn flush_all(&self) -> bool {
        if !self.is_ready() {
            return false;
        }
        let backend = &self.backend;
        match self.guarded(move || backend.flush()).await {
            Ok(()) => {
                self.stats.reset();
                info!("cache flushed");
                true
            }
            Err(e) => {
                warn!(error = %e, "cache flush failed");
                false
            }
        }
    }

    pub fn stats(&self) -> Vec<CategoryStats> { self.stats.snapshot() }

    pub fn category_stats(&self, category: CacheCategory) -> CategoryStats { self.stats.category(category) }

    /// Precompute and cache embeddings for `texts`. Returns how many were
    /// newly stored.
    pub async fn warm_embeddings(&self, texts: &[String], embedder: &dyn Embedder, ttl: Duration) -> usize {
        let mut warmed = 0;
        for text in texts {
            let key = cache_key("embed", text);
            if self.get::<Vec<f32>>(&key, CacheCategory::Embeddings).await.is_some() {
                continue;
            }
            match embedder.embed(text) {
                Ok(v) => {
                    if self.set(&key, &v, ttl).await { warmed += 1; }
                }
                Err(e) => warn!(error = %e, "embedding failed while warming cache"),
            }
        }
        info!(warmed, requested = texts.len(), "embedding cache warmed");
        warmed
    }
}
