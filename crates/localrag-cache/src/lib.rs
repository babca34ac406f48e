//! Cache-aside layer with TTLs, per-category hit/miss statistics and
//! fail-open semantics: an unreachable backend turns every `get` into a
//! miss and every `set` into a no-op, never an error.

pub mod backend;
pub mod layer;
pub mod memory;
pub mod stats;

pub use backend::CacheBackend;
pub use layer::{cache_key, CacheLayer, Compute};
pub use memory::{CacheEntry, MemoryBackend};
pub use stats::{CacheCategory, CacheStats, CategoryStats};
