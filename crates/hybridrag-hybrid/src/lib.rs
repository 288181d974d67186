//! Hybrid retrieval: BM25 and dense candidates fused, reranked by a pairwise
//! model, and served from atomically swapped index snapshots.

pub mod context;
pub mod engine;
pub mod fusion;
pub mod rerank;
pub mod retrieval;
pub mod snapshot;

pub use context::assemble_context;
pub use engine::{AnswerOutcome, HybridEngine, QueryOutcome, QueryTimings, SourcedHit};
pub use fusion::{fuse, normalize_by_max, union_in_first_seen_order};
pub use rerank::{rerank, rerank_with_timeout};
pub use retrieval::{HybridRetriever, Retrieval};
pub use snapshot::{IndexSnapshot, SnapshotHandle, SnapshotHeader, MIN_COMPATIBLE_VERSION, SCHEMA_VERSION, SNAPSHOT_FORMAT};
