use localrag_core::types::{Fragment, Score, SearchResult};
use localrag_core::{Error, Result};
use serde::Serialize;
use tantivy::tokenizer::TextAnalyzer;

use crate::bm25::{Bm25, Bm25Params};
use crate::tokenizer::{build_analyzer, tokenize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordStats {
	pub total_documents: usize,
	pub indexed: bool,
	pub average_doc_length: f32,
}

#[derive(Clone)]
pub struct KeywordIndex {
	pub(crate) params: Bm25Params,
	pub(crate) documents: Vec<String>,
	pub(crate) metadata: Vec<Fragment>,
	pub(crate) ranking: Option<Bm25>,
	analyzer: TextAnalyzer,
}

impl Default for KeywordIndex {
	fn default() -> Self { Self::new(Bm25Params::default()) }
}

impl KeywordIndex {
	pub fn new(params: Bm25Params) -> Self {
		Self { params, documents: Vec::new(), metadata: Vec::new(), ranking: None, analyzer: build_analyzer() }
	}

	pub(crate) fn from_parts(params: Bm25Params, documents: Vec<String>, metadata: Vec<Fragment>, ranking: Option<Bm25>) -> Self {
		Self { params, documents, metadata, ranking, analyzer: build_analyzer() }
	}

	pub fn total(&self) -> usize { self.documents.len() }
	pub fn is_empty(&self) -> bool { self.documents.is_empty() }
	pub fn params(&self) -> Bm25Params { self.params }

	/// Append `texts` with their fragment metadata and rebuild the ranking
	/// over the whole accumulated corpus.
	pub fn add(&mut self, texts: &[String], metadata: &[Fragment]) -> Result<usize> {
		if texts.len() != metadata.len() {
			return Err(Error::LengthMismatch { vectors: texts.len(), items: metadata.len() });
		}
		if texts.is_empty() { return Ok(0); }
		self.documents.extend_from_slice(texts);
		self.metadata.extend_from_slice(metadata);
		self.rebuild();
		tracing::debug!(added = texts.len(), total = self.total(), "keyword index rebuilt");
		Ok(texts.len())
	}

	fn rebuild(&mut self) {
		let corpus: Vec<Vec<String>> = self.documents.iter().map(|d| tokenize(&mut self.analyzer, d)).collect();
		self.ranking = Some(Bm25::build(&corpus, self.params));
	}

	/// Top `k` documents by BM25, descending. Zero-scoring documents are
	/// still returned when `k` reaches them; equal scores keep insertion
	/// order.
	pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
		let Some(ranking) = self.ranking.as_ref().filter(|_| !self.is_empty()) else {
			return Err(Error::EmptyIndex);
		};
		let mut analyzer = self.analyzer.clone();
		let tokens = tokenize(&mut analyzer, query);
		let mut scored: Vec<(usize, f32)> = ranking.scores(&tokens).into_iter().enumerate().collect();
		scored.sort_by(|a, b| b.1.total_cmp(&a.1));
		scored.truncate(k.min(self.total()));
		Ok(scored
			.into_iter()
			.map(|(i, s)| SearchResult::new(self.metadata[i].clone(), Score::Bm25(s)))
			.collect())
	}

	pub fn clear(&mut self) {
		let dropped = self.total();
		self.documents.clear();
		self.metadata.clear();
		self.ranking = None;
		tracing::info!(dropped, "keyword index cleared");
	}

	pub fn stats(&self) -> KeywordStats {
		KeywordStats {
			total_documents: self.total(),
			indexed: self.ranking.is_some(),
			average_doc_length: self.ranking.as_ref().map_or(0.0, Bm25::avgdl),
		}
	}
}
