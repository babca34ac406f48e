use std::fs;
use std::io::Write;
use std::path::Path;

use localrag_core::types::Fragment;
use localrag_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::bm25::{Bm25, Bm25Params};
use crate::index::KeywordIndex;

pub const KEYWORD_FILE: &str = "bm25.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Blob {
	version: u32,
	params: Bm25Params,
	documents: Vec<String>,
	metadata: Vec<Fragment>,
	ranking: Option<Bm25>,
}

impl KeywordIndex {
	pub fn save(&self, dir: &Path) -> Result<()> {
		fs::create_dir_all(dir)?;
		let blob = Blob {
			version: FORMAT_VERSION,
			params: self.params,
			documents: self.documents.clone(),
			metadata: self.metadata.clone(),
			ranking: self.ranking.clone(),
		};
		let bytes = serde_json::to_vec(&blob).map_err(|e| Error::Io(e.into()))?;
		let mut tmp = NamedTempFile::new_in(dir)?;
		tmp.write_all(&bytes)?;
		tmp.as_file().sync_all()?;
		tmp.persist(dir.join(KEYWORD_FILE)).map_err(|e| Error::Io(e.error))?;
		tracing::info!(dir = %dir.display(), total = self.total(), "keyword index saved");
		Ok(())
	}

	pub fn load(dir: &Path) -> Result<Self> {
		let path = dir.join(KEYWORD_FILE);
		if !path.exists() { return Err(Error::NotFound(format!("no keyword index in {}", dir.display()))); }
		let blob: Blob = serde_json::from_slice(&fs::read(&path)?).map_err(|e| Error::corrupt(&path, e.to_string()))?;
		if blob.version != FORMAT_VERSION {
			return Err(Error::corrupt(&path, format!("unsupported version {}", blob.version)));
		}
		if blob.documents.len() != blob.metadata.len() {
			return Err(Error::corrupt(&path, format!("{} documents for {} metadata rows", blob.documents.len(), blob.metadata.len())));
		}
		match &blob.ranking {
			None if !blob.documents.is_empty() => return Err(Error::corrupt(&path, "documents present without ranking")),
			Some(r) if !r.is_consistent(blob.documents.len()) => return Err(Error::corrupt(&path, "ranking does not match documents")),
			_ => {}
		}
		tracing::info!(dir = %dir.display(), total = blob.documents.len(), "keyword index loaded");
		Ok(KeywordIndex::from_parts(blob.params, blob.documents, blob.metadata, blob.ranking))
	}

	pub fn load_or_default(dir: &Path) -> Result<Self> {
		match Self::load(dir) {
			Err(Error::NotFound(_)) => Ok(Self::default()),
			other => other,
		}
	}
}
