use localrag_core::config::{SearchMode, SearchSettings};
use localrag_core::types::{Score, SearchResult};
use localrag_core::Result;
use localrag_text::KeywordIndex;
use localrag_vector::VectorIndex;
use tracing::debug;

use crate::fusion::fuse_results;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Matches { results: Vec<SearchResult>, confidence: f32 },
    /// Candidates exist but the best one falls outside the relevance gate.
    NoRelevantMatch { best: SearchResult },
    /// Nothing has been indexed.
    Empty,
}

impl SearchOutcome {
    pub fn results(&self) -> &[SearchResult] {
        match self {
            SearchOutcome::Matches { results, .. } => results,
            SearchOutcome::NoRelevantMatch { best } => std::slice::from_ref(best),
            SearchOutcome::Empty => &[],
        }
    }
}

/// Picks candidates from the indices, fuses them and applies the
/// relevance gate. Holds configuration only; indices are borrowed per call.
#[derive(Debug, Clone)]
pub struct SearchOrchestrator {
    settings: SearchSettings,
}

impl SearchOrchestrator {
    pub fn new(settings: SearchSettings) -> Self { Self { settings } }

    pub fn settings(&self) -> &SearchSettings { &self.settings }

    pub fn search(&self, vector: &VectorIndex, keyword: &KeywordIndex, query: &str, query_vector: &[f32]) -> Result<SearchOutcome> {
        let s = &self.settings;
        let results = match s.mode {
            SearchMode::Vector => {
                if vector.is_empty() { return Ok(SearchOutcome::Empty); }
                vector.search(query_vector, s.top_k)?
            }
            SearchMode::Hybrid => {
                let dense = if vector.is_empty() { Vec::new() } else { vector.search(query_vector, s.candidate_count)? };
                let sparse = if keyword.is_empty() { Vec::new() } else { keyword.search(query, s.candidate_count)? };
                debug!(dense = dense.len(), sparse = sparse.len(), "hybrid candidates");
                if dense.is_empty() && sparse.is_empty() { return Ok(SearchOutcome::Empty); }
                fuse_results(dense, sparse, s.rrf_k, s.top_k)?
            }
        };
        Ok(self.gate(results))
    }

    /// Judge the top result against the configured thresholds.
    pub fn gate(&self, results: Vec<SearchResult>) -> SearchOutcome {
        let Some(top) = results.first() else { return SearchOutcome::Empty };
        let s = &self.settings;
        let (relevant, confidence) = match top.score {
            Score::Distance(d) => (d <= s.max_distance, top.score.confidence(s.max_distance)),
            Score::Bm25(v) => (v > s.min_keyword_score, top.score.confidence(s.keyword_full_confidence)),
        };
        if relevant {
            SearchOutcome::Matches { results, confidence }
        } else {
            debug!(score = ?top.score, "best candidate rejected by relevance gate");
            let best = top.clone();
            SearchOutcome::NoRelevantMatch { best }
        }
    }
}
