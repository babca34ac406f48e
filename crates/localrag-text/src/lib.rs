//! localrag-text
//!
//! BM25 (Okapi) keyword ranking over whitespace-tokenized, lowercased text.
//! Corpus statistics are rebuilt on every `add`, trading O(corpus) inserts
//! for a single consistent ranking structure.

pub mod tokenizer;
pub mod bm25;
pub mod index;
pub mod persist;

pub use bm25::Bm25Params;
pub use index::{KeywordIndex, KeywordStats};
pub use persist::KEYWORD_FILE;
