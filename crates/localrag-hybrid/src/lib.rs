pub mod answer;
pub mod engine;
pub mod fusion;
pub mod ingest;
pub mod orchestrator;

pub use answer::{Answer, AnswerKind, AnswerService};
pub use engine::{EngineStats, IndexPaths, RagEngine};
pub use fusion::{fuse_ids, fuse_results, RankedId, DEFAULT_RRF_K};
pub use ingest::{IngestReport, Ingestor};
pub use orchestrator::{SearchOrchestrator, SearchOutcome};
