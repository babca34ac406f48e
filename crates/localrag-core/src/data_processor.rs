use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::Chunk;

/// One source file split into chunks, with its raw bytes kept for hashing.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub filename: String,
    pub bytes: Vec<u8>,
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_words: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_words: 300, overlap_percent: 0.2 }
    }
}

/// Paragraph chunker for plain-text corpora. Production chunking lives
/// outside this workspace; this one is enough for the CLI and tests.
#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<SourceDocument>> {
        let files = self.list_txt_files(data_dir);
        if files.is_empty() {
            tracing::warn!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut documents = Vec::with_capacity(files.len());
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::debug!(file = %file_path.display(), "processing file {}/{}", file_index + 1, files.len());
            documents.push(self.process_file(file_path)?);
        }
        let total: usize = documents.iter().map(|d| d.chunks.len()).sum();
        tracing::info!(files = documents.len(), chunks = total, "processed directory");
        Ok(documents)
    }

    pub fn process_file(&self, file_path: &Path) -> Result<SourceDocument> {
        let bytes = fs::read(file_path)?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let filename = file_path
            .file_name()
            .map_or_else(|| file_path.to_string_lossy().into_owned(), |n| n.to_string_lossy().into_owned());
        let chunks = self.chunk_content(&content, &filename);
        Ok(SourceDocument { path: file_path.to_path_buf(), filename, bytes, chunks })
    }

    pub fn chunk_content(&self, content: &str, source_label: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for paragraph in content.split("\n\n") {
            let paragraph = paragraph.trim(); if paragraph.is_empty() { continue; }
            if paragraph.split_whitespace().count() <= self.chunking_config.max_words {
                chunks.push(Chunk::new(paragraph, source_label));
            } else {
                for sub_chunk in self.split_paragraph_with_overlap(paragraph) {
                    chunks.push(Chunk::new(sub_chunk, source_label));
                }
            }
        }
        chunks
    }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let words_per_chunk = self.chunking_config.max_words.max(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let overlap_words = ((words_per_chunk as f32 * self.chunking_config.overlap_percent) as usize).min(words_per_chunk - 1);
        let mut chunks = Vec::new(); let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start = end - overlap_words;
        }
        chunks
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(std::result::Result::ok).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort(); txt_files
    }
}
