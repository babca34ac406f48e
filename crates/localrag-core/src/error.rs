use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Length mismatch: {vectors} vectors for {items} items")]
    LengthMismatch { vectors: usize, items: usize },

    #[error("Index is empty")]
    EmptyIndex,

    #[error("No candidates to fuse")]
    NoCandidates,

    #[error("Circuit '{name}' is open")]
    CircuitOpen { name: String },

    #[error("Timed out after {limit:?}")]
    TimeoutExceeded { limit: Duration },

    #[error("Transient I/O failure: {0}")]
    TransientIo(String),

    #[error("Corrupt index data at {path}: {reason}")]
    PersistenceCorruption { path: PathBuf, reason: String },

    #[error("Dependency failed: {0}")]
    Dependency(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Fieldless discriminant of [`Error`], used where a policy names error
/// classes (for example the kinds a retry policy treats as transient).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DimensionMismatch,
    LengthMismatch,
    EmptyIndex,
    NoCandidates,
    CircuitOpen,
    TimeoutExceeded,
    TransientIo,
    PersistenceCorruption,
    Dependency,
    InvalidConfig,
    NotFound,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Error::LengthMismatch { .. } => ErrorKind::LengthMismatch,
            Error::EmptyIndex => ErrorKind::EmptyIndex,
            Error::NoCandidates => ErrorKind::NoCandidates,
            Error::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Error::TimeoutExceeded { .. } => ErrorKind::TimeoutExceeded,
            Error::TransientIo(_) => ErrorKind::TransientIo,
            Error::PersistenceCorruption { .. } => ErrorKind::PersistenceCorruption,
            Error::Dependency(_) => ErrorKind::Dependency,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Failures worth another attempt against the same dependency.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::TransientIo | ErrorKind::TimeoutExceeded)
    }

    /// Whether this error says something about the health of a remote
    /// dependency. Caller-contract violations (bad dimensions, empty
    /// inputs) do not, and must not trip a circuit breaker.
    pub fn is_dependency_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransientIo | ErrorKind::TimeoutExceeded | ErrorKind::Dependency | ErrorKind::Io
        )
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::PersistenceCorruption { path: path.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
