//! Exact nearest-neighbour index over fixed-dimension embeddings.
//!
//! Vectors are kept in one flat row-major buffer and searched by brute
//! force with squared L2 distance. The index owns fragment id assignment:
//! ids are handed out sequentially on `add` and never reused.

pub mod index;
pub mod persist;

pub use index::{VectorIndex, VectorStats};
pub use persist::{FRAGMENTS_FILE, VECTORS_FILE};
