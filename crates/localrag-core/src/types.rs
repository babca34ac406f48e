//! Domain types shared by the indices, the ranker and the host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type FragmentId = u64;

/// A text fragment before the vector index has assigned it an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_label: String,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source_label: impl Into<String>) -> Self {
        Self { text: text.into(), source_label: source_label.into() }
    }
}

/// An indexed, immutable piece of a source document.
///
/// `id` is assigned sequentially by the vector index and never reused,
/// so the same fragment is addressable from both indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: FragmentId,
    pub text: String,
    pub source_label: String,
}

/// Engine-specific score. The variants live on opposite scales and are
/// never compared with each other directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Score {
    /// Squared L2 distance; lower is more similar.
    Distance(f32),
    /// BM25 relevance; higher is more relevant.
    Bm25(f32),
}

impl Score {
    pub fn raw(&self) -> f32 {
        match *self {
            Score::Distance(v) | Score::Bm25(v) => v,
        }
    }

    /// Map the score linearly into `[0, 1]`, where `full_scale` is the
    /// distance at which confidence reaches zero (for distances) or the
    /// BM25 score at which it reaches one.
    pub fn confidence(&self, full_scale: f32) -> f32 {
        if full_scale <= 0.0 {
            return 0.0;
        }
        let c = match *self {
            Score::Distance(d) => 1.0 - d / full_scale,
            Score::Bm25(s) => s / full_scale,
        };
        c.clamp(0.0, 1.0)
    }
}

/// One ranked hit. `fused_score` is present only when the result went
/// through rank fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub fragment: Fragment,
    pub score: Score,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fused_score: Option<f32>,
}

impl SearchResult {
    pub fn new(fragment: Fragment, score: Score) -> Self {
        Self { fragment, score, fused_score: None }
    }

    pub fn id(&self) -> FragmentId {
        self.fragment.id
    }
}

/// Book-keeping row for an ingested source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub filename: String,
    pub file_hash: String,
    pub chunks_count: usize,
    pub ingested_at: DateTime<Utc>,
}
