use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    Embeddings,
    ExternalSearch,
    Search,
    General,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 4] =
        [CacheCategory::Embeddings, CacheCategory::ExternalSearch, CacheCategory::Search, CacheCategory::General];

    fn slot(self) -> usize {
        match self {
            CacheCategory::Embeddings => 0,
            CacheCategory::ExternalSearch => 1,
            CacheCategory::Search => 2,
            CacheCategory::General => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: CacheCategory,
    pub hits: u64,
    pub misses: u64,
    pub total: u64,
    pub hit_ratio: f64,
}

/// Lock-free hit/miss counters, one pair per category.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: [AtomicU64; 4],
    misses: [AtomicU64; 4],
}

impl CacheStats {
    pub fn record_hit(&self, category: CacheCategory) {
        self.hits[category.slot()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self, category: CacheCategory) {
        self.misses[category.slot()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn category(&self, category: CacheCategory) -> CategoryStats {
        let hits = self.hits[category.slot()].load(Ordering::Relaxed);
        let misses = self.misses[category.slot()].load(Ordering::Relaxed);
        let total = hits + misses;
        #[allow(clippy::cast_precision_loss)]
        let hit_ratio = if total == 0 { 0.0 } else { hits as f64 / total as f64 };
        CategoryStats { category, hits, misses, total, hit_ratio }
    }

    pub fn snapshot(&self) -> Vec<CategoryStats> {
        CacheCategory::ALL.iter().map(|c| self.category(*c)).collect()
    }

    pub fn reset(&self) {
        for c in self.hits.iter().chain(self.misses.iter()) { c.store(0, Ordering::Relaxed); }
    }
}
