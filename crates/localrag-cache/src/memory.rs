use std::time::Duration;

use async_trait::async_trait;
use localrag_core::{Error, Result};
use moka::sync::Cache;
use moka::Expiry;
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::backend::CacheBackend;

pub const DEFAULT_CAPACITY: u64 = 100_000;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub ttl: Duration,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool { now < self.expires_at }
}

/// Evicts each entry once its own TTL has run out.
struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &CacheEntry, _created_at: std::time::Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: std::time::Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process backend on a bounded moka cache.
///
/// moka evicts expired entries on its own clock. Reads also check
/// `expires_at` against the tokio clock, so an entry is never served past
/// its TTL even before moka gets round to evicting it. Pattern deletes and
/// flushes take the gate exclusively, single-key operations share it.
pub struct MemoryBackend {
    entries: Cache<String, CacheEntry>,
    gate: RwLock<()>,
}

impl Default for MemoryBackend {
    fn default() -> Self { Self::with_capacity(DEFAULT_CAPACITY) }
}

impl MemoryBackend {
    pub fn new() -> Self { Self::default() }

    pub fn with_capacity(max_entries: u64) -> Self {
        let entries = Cache::builder().max_capacity(max_entries).expire_after(EntryTtl).build();
        Self { entries, gate: RwLock::new(()) }
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let _shared = self.gate.read();
        self.entries.iter().filter(|(_, e)| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn ping(&self) -> Result<()> { Ok(()) }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        let _shared = self.gate.read();
        match self.entries.get(key) {
            Some(e) if e.is_live(now) => Ok(Some(e.value)),
            Some(_) => {
                self.entries.invalidate(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let entry = CacheEntry { key: key.to_string(), value, ttl, expires_at: Instant::now() + ttl };
        let _shared = self.gate.read();
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let _shared = self.gate.read();
        Ok(self.entries.remove(key).is_some_and(|e| e.is_live(now)))
    }

    /// Expired entries matching `pattern` are dropped too but not counted.
    async fn delete_matching(&self, pattern: &str) -> Result<usize> {
        let pattern = glob::Pattern::new(pattern).map_err(|e| Error::InvalidConfig(format!("bad cache key pattern '{pattern}': {e}")))?;
        let now = Instant::now();
        let _exclusive = self.gate.write();
        let matched: Vec<(String, bool)> = self
            .entries
            .iter()
            .filter(|(k, _)| pattern.matches(k))
            .map(|(k, e)| (k.as_ref().clone(), e.is_live(now)))
            .collect();
        let mut removed = 0;
        for (key, live) in matched {
            self.entries.invalidate(&key);
            if live { removed += 1; }
        }
        Ok(removed)
    }

    async fn flush(&self) -> Result<()> {
        let _exclusive = self.gate.write();
        self.entries.invalidate_all();
        Ok(())
    }
}
