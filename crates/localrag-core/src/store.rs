//! [`DocumentStore`] implementations for single-node deployments and tests.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::traits::DocumentStore;
use crate::types::DocumentRecord;

#[derive(Default)]
pub struct InMemoryDocumentStore {
    records: Mutex<Vec<DocumentRecord>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.records.lock().len() }

    pub fn is_empty(&self) -> bool { self.records.lock().is_empty() }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_by_hash(&self, file_hash: &str) -> Result<Option<DocumentRecord>> {
        Ok(self.records.lock().iter().find(|r| r.file_hash == file_hash).cloned())
    }

    async fn insert(&self, record: DocumentRecord) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }

    async fn delete_all(&self) -> Result<usize> {
        let mut records = self.records.lock();
        let n = records.len();
        records.clear();
        Ok(n)
    }

    async fn total_chunks(&self) -> Result<usize> {
        Ok(self.records.lock().iter().map(|r| r.chunks_count).sum())
    }
}

/// Records kept in one JSON file, rewritten atomically after every
/// change. A missing file is an empty store; an unreadable one is an error.
pub struct JsonFileDocumentStore {
    path: PathBuf,
    records: Mutex<Vec<DocumentRecord>>,
}

impl JsonFileDocumentStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let bytes = std::fs::read(&path)?;
            serde_json::from_slice(&bytes).map_err(|e| Error::corrupt(&path, e.to_string()))?
        } else {
            Vec::new()
        };
        tracing::debug!(path = %path.display(), records = records.len(), "document store opened");
        Ok(Self { path, records: Mutex::new(records) })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn write(&self, records: &[DocumentRecord]) -> Result<()> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_vec_pretty(records).map_err(|e| Error::corrupt(&self.path, e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonFileDocumentStore {
    async fn find_by_hash(&self, file_hash: &str) -> Result<Option<DocumentRecord>> {
        Ok(self.records.lock().iter().find(|r| r.file_hash == file_hash).cloned())
    }

    async fn insert(&self, record: DocumentRecord) -> Result<()> {
        let mut records = self.records.lock();
        records.push(record);
        if let Err(e) = self.write(&records) {
            records.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<usize> {
        let mut records = self.records.lock();
        let n = records.len();
        self.write(&[])?;
        records.clear();
        Ok(n)
    }

    async fn total_chunks(&self) -> Result<usize> {
        Ok(self.records.lock().iter().map(|r| r.chunks_count).sum())
    }
}
