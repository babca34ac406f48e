pub mod config;
pub mod data_processor;
pub mod error;
pub mod store;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::{Chunk, Fragment, Score, SearchResult};
