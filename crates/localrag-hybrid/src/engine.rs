use std::path::PathBuf;
use std::sync::Arc;

use localrag_cache::{cache_key, CacheCategory, CacheLayer, CategoryStats};
use localrag_core::config::Settings;
use localrag_core::traits::Embedder;
use localrag_core::{Error, Result};
use localrag_resilience::{BreakerRegistry, BreakerSnapshot, Resilience};
use localrag_text::{KeywordIndex, KeywordStats};
use localrag_vector::{VectorIndex, VectorStats};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::orchestrator::{SearchOrchestrator, SearchOutcome};

/// Where the two indices persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub vector_dir: PathBuf,
    pub keyword_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub vector: VectorStats,
    pub keyword: KeywordStats,
    pub cache: Vec<CategoryStats>,
    pub breakers: Vec<BreakerSnapshot>,
}

/// Host-owned container for the retrieval core. Build one per process
/// and share it by `Arc`.
///
/// Each index sits behind its own `RwLock`: many concurrent searches or
/// one writer. Locks are only held for synchronous index work.
pub struct RagEngine {
    settings: Settings,
    vector: Arc<RwLock<VectorIndex>>,
    keyword: Arc<RwLock<KeywordIndex>>,
    embedder: Arc<dyn Embedder>,
    cache: Arc<CacheLayer>,
    breakers: Arc<BreakerRegistry>,
    orchestrator: SearchOrchestrator,
    paths: Option<IndexPaths>,
    initialized: OnceCell<()>,
}

impl RagEngine {
    pub fn new(settings: Settings, embedder: Arc<dyn Embedder>, cache: CacheLayer, paths: Option<IndexPaths>) -> Result<Self> {
        settings.validate()?;
        if embedder.dim() != settings.embedding.dimension {
            return Err(Error::DimensionMismatch { expected: settings.embedding.dimension, actual: embedder.dim() });
        }
        let breakers = Arc::new(BreakerRegistry::new());
        let cache = if settings.cache.enabled {
            cache.with_guard(Resilience::from_settings(&breakers, "cache", &settings.resilience.cache))
        } else {
            CacheLayer::disabled()
        };
        Ok(Self {
            vector: Arc::new(RwLock::new(VectorIndex::new(settings.embedding.dimension)?)),
            keyword: Arc::new(RwLock::new(KeywordIndex::default())),
            orchestrator: SearchOrchestrator::new(settings.search.clone()),
            embedder,
            cache: Arc::new(cache),
            breakers,
            paths,
            settings,
            initialized: OnceCell::new(),
        })
    }

    /// Load persisted indices and connect the cache. Runs once; later
    /// calls return immediately. An unreachable cache is logged, not
    /// fatal.
    pub async fn initialize(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| async {
                if let Some(paths) = self.paths.clone() {
                    let dimension = self.settings.embedding.dimension;
                    let (vector, keyword) = tokio::task::spawn_blocking(move || -> Result<(VectorIndex, KeywordIndex)> {
                        Ok((VectorIndex::load_or_new(&paths.vector_dir, dimension)?, KeywordIndex::load_or_default(&paths.keyword_dir)?))
                    })
                    .await
                    .map_err(|e| Error::Io(std::io::Error::other(e)))??;
                    if vector.total() != keyword.total() {
                        warn!(vector = vector.total(), keyword = keyword.total(), "index sizes differ");
                    }
                    info!(fragments = vector.total(), "indices loaded");
                    *self.vector.write() = vector;
                    *self.keyword.write() = keyword;
                }
                if let Err(e) = self.cache.initialize().await {
                    warn!(error = %e, "cache unavailable, continuing without it");
                }
                Ok::<(), Error>(())
            })
            .await?;
        Ok(())
    }

    pub fn settings(&self) -> &Settings { &self.settings }
    pub fn vector(&self) -> &Arc<RwLock<VectorIndex>> { &self.vector }
    pub fn keyword(&self) -> &Arc<RwLock<KeywordIndex>> { &self.keyword }
    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }
    pub fn cache(&self) -> &Arc<CacheLayer> { &self.cache }
    pub fn breakers(&self) -> &Arc<BreakerRegistry> { &self.breakers }
    pub fn orchestrator(&self) -> &SearchOrchestrator { &self.orchestrator }

    /// Embed `text`, going through the embedding cache.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let key = cache_key("embed", text);
        let embedder = &self.embedder;
        let v: Vec<f32> = self
            .cache
            .get_or_compute(
                &key,
                move || {
                    let out = embedder.embed(text);
                    async move { out }
                },
                self.settings.cache.embedding_ttl(),
                CacheCategory::Embeddings,
            )
            .await?;
        if v.len() != self.settings.embedding.dimension {
            return Err(Error::DimensionMismatch { expected: self.settings.embedding.dimension, actual: v.len() });
        }
        Ok(v)
    }

    pub async fn search(&self, query: &str) -> Result<SearchOutcome> {
        let query_vector = self.embed_query(query).await?;
        let vector = self.vector.read();
        let keyword = self.keyword.read();
        self.orchestrator.search(&vector, &keyword, query, &query_vector)
    }

    /// Write both indices to disk, if the engine has paths.
    pub async fn persist(&self) -> Result<()> {
        let Some(paths) = self.paths.clone() else { return Ok(()) };
        let vector = Arc::clone(&self.vector);
        let keyword = Arc::clone(&self.keyword);
        tokio::task::spawn_blocking(move || -> Result<()> {
            // Both guards held so the two files describe the same corpus.
            let vector = vector.read();
            let keyword = keyword.read();
            vector.save(&paths.vector_dir)?;
            keyword.save(&paths.keyword_dir)
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            vector: self.vector.read().stats(),
            keyword: self.keyword.read().stats(),
            cache: self.cache.stats(),
            breakers: self.breakers.snapshots(),
        }
    }
}
