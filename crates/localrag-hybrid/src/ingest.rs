use std::sync::Arc;

use chrono::Utc;
use localrag_core::data_processor::SourceDocument;
use localrag_core::traits::DocumentStore;
use localrag_core::types::{Chunk, DocumentRecord, Fragment};
use localrag_core::Result;
use localrag_text::KeywordIndex;
use localrag_resilience::Resilience;
use localrag_vector::VectorIndex;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::engine::RagEngine;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub filename: String,
    pub file_hash: String,
    pub chunks_added: usize,
    /// The same bytes were ingested before; nothing changed.
    pub duplicate: bool,
}

/// Adds documents to both indices, idempotently by content hash.
///
/// Ingests and clears are serialized, from the duplicate check through the
/// document record insert. A failed ingest leaves both indices, on disk and
/// in memory, as they were before it started.
pub struct Ingestor {
    engine: Arc<RagEngine>,
    store: Arc<dyn DocumentStore>,
    guard: Resilience,
    gate: Mutex<()>,
}

impl Ingestor {
    pub fn new(engine: Arc<RagEngine>, store: Arc<dyn DocumentStore>) -> Self {
        let guard = Resilience::from_settings(engine.breakers(), "store", &engine.settings().resilience.store);
        Self { engine, store, guard, gate: Mutex::new(()) }
    }

    pub fn file_hash(bytes: &[u8]) -> String {
        blake3::hash(bytes).to_hex().to_string()
    }

    pub async fn ingest_document(&self, doc: &SourceDocument) -> Result<IngestReport> {
        self.ingest(&doc.filename, &doc.bytes, &doc.chunks).await
    }

    pub async fn ingest(&self, filename: &str, bytes: &[u8], chunks: &[Chunk]) -> Result<IngestReport> {
        let file_hash = Self::file_hash(bytes);
        let _serial = self.gate.lock().await;
        let store = &self.store;
        let hash = file_hash.as_str();
        if let Some(existing) = self.guard.call(move || store.find_by_hash(hash)).await? {
            info!(filename, previous = %existing.filename, "document already ingested, skipping");
            return Ok(IngestReport { filename: filename.to_string(), file_hash, chunks_added: 0, duplicate: true });
        }
        if chunks.is_empty() {
            warn!(filename, "document produced no chunks");
            return Ok(IngestReport { filename: filename.to_string(), file_hash, chunks_added: 0, duplicate: false });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.engine.embedder().embed_batch(&texts)?;
        let (added, snapshot) = {
            let mut vector = self.engine.vector().write();
            let mut keyword = self.engine.keyword().write();
            let snapshot = (vector.clone(), keyword.clone());
            let added = vector.add(&vectors, chunks).and_then(|added| {
                let fragments: Vec<Fragment> = vector.fragments()[vector.total() - added..].to_vec();
                keyword.add(&texts, &fragments).map(|_| added)
            });
            match added {
                Ok(added) => (added, snapshot),
                Err(e) => {
                    (*vector, *keyword) = snapshot;
                    return Err(e);
                }
            }
        };

        let record = DocumentRecord { filename: filename.to_string(), file_hash: file_hash.clone(), chunks_count: added, ingested_at: Utc::now() };
        let committed = match self.engine.persist().await {
            Ok(()) => self.guard.call(move || store.insert(record.clone())).await,
            Err(e) => Err(e),
        };
        if let Err(e) = committed {
            self.roll_back(snapshot).await;
            return Err(e);
        }
        info!(filename, chunks = added, "document ingested");
        Ok(IngestReport { filename: filename.to_string(), file_hash, chunks_added: added, duplicate: false })
    }

    async fn roll_back(&self, (vector, keyword): (VectorIndex, KeywordIndex)) {
        {
            *self.engine.vector().write() = vector;
            *self.engine.keyword().write() = keyword;
        }
        if let Err(e) = self.engine.persist().await {
            warn!(error = %e, "failed to persist rolled back indices");
        }
    }

    /// Empty both indices and the document store. Returns how many
    /// document records were deleted.
    pub async fn clear_all(&self) -> Result<usize> {
        let _serial = self.gate.lock().await;
        {
            let mut vector = self.engine.vector().write();
            let mut keyword = self.engine.keyword().write();
            vector.clear();
            keyword.clear();
        }
        self.engine.persist().await?;
        let store = &self.store;
        let deleted = self.guard.call(move || store.delete_all()).await?;
        info!(deleted, "corpus cleared");
        Ok(deleted)
    }
}
