use async_trait::async_trait;

use crate::error::Result;
use crate::types::DocumentRecord;

/// Deterministic text-to-vector mapping. Implementations must return
/// vectors of exactly `dim()` components.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Remote text-generation service.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> Result<String>;
    async fn is_context_relevant(&self, question: &str, context: &str) -> Result<bool>;
}

/// Relational store of ingested-document metadata.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_by_hash(&self, file_hash: &str) -> Result<Option<DocumentRecord>>;
    async fn insert(&self, record: DocumentRecord) -> Result<()>;
    /// Remove every record, returning how many were deleted.
    async fn delete_all(&self) -> Result<usize>;
    async fn total_chunks(&self) -> Result<usize>;
}
