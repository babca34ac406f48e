use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
	pub k1: f32,
	pub b: f32,
	/// Negative IDFs are floored to `epsilon * mean_idf`.
	pub epsilon: f32,
}

impl Default for Bm25Params {
	fn default() -> Self { Self { k1: 1.5, b: 0.75, epsilon: 0.25 } }
}

/// Okapi BM25 statistics over a fixed tokenized corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bm25 {
	pub(crate) params: Bm25Params,
	pub(crate) avgdl: f32,
	pub(crate) doc_len: Vec<usize>,
	pub(crate) doc_freqs: Vec<BTreeMap<String, u32>>,
	pub(crate) idf: BTreeMap<String, f32>,
}

impl Bm25 {
	pub fn build(corpus: &[Vec<String>], params: Bm25Params) -> Self {
		let mut doc_len = Vec::with_capacity(corpus.len());
		let mut doc_freqs = Vec::with_capacity(corpus.len());
		let mut nd: BTreeMap<String, u32> = BTreeMap::new();
		let mut total_words = 0usize;
		for doc in corpus {
			doc_len.push(doc.len());
			total_words += doc.len();
			let mut freqs: BTreeMap<String, u32> = BTreeMap::new();
			for token in doc { *freqs.entry(token.clone()).or_default() += 1; }
			for term in freqs.keys() { *nd.entry(term.clone()).or_default() += 1; }
			doc_freqs.push(freqs);
		}
		#[allow(clippy::cast_precision_loss)]
		let n = corpus.len() as f32;
		#[allow(clippy::cast_precision_loss)]
		let avgdl = if corpus.is_empty() { 0.0 } else { total_words as f32 / n };

		let mut idf = BTreeMap::new();
		let mut idf_sum = 0.0f32;
		let mut negative = Vec::new();
		for (term, freq) in nd {
			#[allow(clippy::cast_precision_loss)]
			let freq = freq as f32;
			let v = (n - freq + 0.5).ln() - (freq + 0.5).ln();
			idf_sum += v;
			if v < 0.0 { negative.push(term.clone()); }
			idf.insert(term, v);
		}
		if !idf.is_empty() {
			#[allow(clippy::cast_precision_loss)]
			let floor = params.epsilon * (idf_sum / idf.len() as f32);
			for term in negative { idf.insert(term, floor); }
		}
		Self { params, avgdl, doc_len, doc_freqs, idf }
	}

	pub fn len(&self) -> usize { self.doc_len.len() }
	pub fn is_empty(&self) -> bool { self.doc_len.is_empty() }
	pub fn avgdl(&self) -> f32 { self.avgdl }
	pub fn idf(&self, term: &str) -> Option<f32> { self.idf.get(term).copied() }

	/// Score of every document for `query`, in corpus order. Repeated
	/// query terms contribute once per occurrence.
	pub fn scores(&self, query: &[String]) -> Vec<f32> {
		let Bm25Params { k1, b, .. } = self.params;
		let avgdl = if self.avgdl > 0.0 { self.avgdl } else { 1.0 };
		let mut scores = vec![0.0f32; self.len()];
		for term in query {
			let Some(idf) = self.idf(term) else { continue };
			for (i, freqs) in self.doc_freqs.iter().enumerate() {
				let Some(&tf) = freqs.get(term) else { continue };
				#[allow(clippy::cast_precision_loss)]
				let (tf, dl) = (tf as f32, self.doc_len[i] as f32);
				scores[i] += idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / avgdl));
			}
		}
		scores
	}

	/// Structural consistency, checked after deserialization.
	pub(crate) fn is_consistent(&self, documents: usize) -> bool {
		self.doc_len.len() == documents
			&& self.doc_freqs.len() == documents
			&& self.doc_freqs.iter().zip(&self.doc_len).all(|(f, &l)| f.values().map(|&c| c as usize).sum::<usize>() == l)
			&& self.doc_freqs.iter().all(|f| f.keys().all(|t| self.idf.contains_key(t)))
	}
}
