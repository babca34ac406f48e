use std::collections::BTreeSet;

use localrag_core::types::{Chunk, Fragment, FragmentId, Score, SearchResult};
use localrag_core::{Error, Result};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VectorStats {
    pub total_vectors: usize,
    pub dimension: usize,
    pub sources: usize,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    /// Row-major, `fragments.len() * dimension` components.
    vectors: Vec<f32>,
    fragments: Vec<Fragment>,
    next_id: FragmentId,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidConfig("vector dimension must be positive".into()));
        }
        Ok(Self { dimension, vectors: Vec::new(), fragments: Vec::new(), next_id: 0 })
    }

    pub(crate) fn from_parts(dimension: usize, vectors: Vec<f32>, fragments: Vec<Fragment>, next_id: FragmentId) -> Self {
        Self { dimension, vectors, fragments, next_id }
    }

    pub fn dimension(&self) -> usize { self.dimension }
    pub fn total(&self) -> usize { self.fragments.len() }
    pub fn is_empty(&self) -> bool { self.fragments.is_empty() }
    pub fn next_id(&self) -> FragmentId { self.next_id }
    pub fn fragments(&self) -> &[Fragment] { &self.fragments }
    pub(crate) fn raw_vectors(&self) -> &[f32] { &self.vectors }

    pub fn fragment(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.binary_search_by_key(&id, |f| f.id).ok().map(|i| &self.fragments[i])
    }

    /// Append `vectors` paired one-to-one with `chunks`, returning the
    /// number added. Nothing is mutated unless every input is valid.
    pub fn add(&mut self, vectors: &[Vec<f32>], chunks: &[Chunk]) -> Result<usize> {
        if vectors.len() != chunks.len() {
            return Err(Error::LengthMismatch { vectors: vectors.len(), items: chunks.len() });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::DimensionMismatch { expected: self.dimension, actual: bad.len() });
        }
        self.vectors.reserve(vectors.len() * self.dimension);
        self.fragments.reserve(chunks.len());
        for (v, chunk) in vectors.iter().zip(chunks) {
            self.vectors.extend_from_slice(v);
            self.fragments.push(Fragment { id: self.next_id, text: chunk.text.clone(), source_label: chunk.source_label.clone() });
            self.next_id += 1;
        }
        tracing::debug!(added = chunks.len(), total = self.total(), "vector index add");
        Ok(chunks.len())
    }

    /// The `k` nearest fragments by squared L2 distance, ascending.
    /// Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if self.is_empty() {
            return Err(Error::EmptyIndex);
        }
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch { expected: self.dimension, actual: query.len() });
        }
        let k = k.min(self.total());
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .map(|row| squared_l2(row, query))
            .enumerate()
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(i, d)| SearchResult::new(self.fragments[i].clone(), Score::Distance(d)))
            .collect())
    }

    /// Drop every vector and fragment. Ids handed out before the clear
    /// stay retired.
    pub fn clear(&mut self) {
        let dropped = self.total();
        self.vectors.clear();
        self.fragments.clear();
        tracing::info!(dropped, "vector index cleared");
    }

    pub fn stats(&self) -> VectorStats {
        let sources: BTreeSet<&str> = self.fragments.iter().map(|f| f.source_label.as_str()).collect();
        VectorStats { total_vectors: self.total(), dimension: self.dimension, sources: sources.len() }
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squared_distance_has_no_root() {
        assert!((squared_l2(&[0.0, 0.0], &[3.0, 4.0]) - 25.0).abs() < 1e-6);
    }

    #[test]
    fn ids_survive_clear() {
        let mut idx = VectorIndex::new(1).unwrap();
        idx.add(&[vec![0.0], vec![1.0]], &[Chunk::new("a", "s"), Chunk::new("b", "s")]).unwrap();
        idx.clear();
        idx.add(&[vec![2.0]], &[Chunk::new("c", "s")]).unwrap();
        assert_eq!(idx.fragments()[0].id, 2);
        assert_eq!(idx.fragment(2).map(|f| f.text.as_str()), Some("c"));
        assert!(idx.fragment(0).is_none());
    }
}
