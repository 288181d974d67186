//! Error taxonomy shared by every crate in the workspace.
//!
//! Build-time variants are fatal to the build call that raised them. Query-time
//! misses (absent terms, unretrieved chunks) are not errors and never show up here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot build an index over an empty corpus")]
    EmptyCorpus,

    #[error("Embedding dimension mismatch at position {position}: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        position: usize,
    },

    #[error("Invalid chunk at position {position}: {reason}")]
    InvalidChunk { position: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Incompatible snapshot schema version {found} (supported: {supported})")]
    SnapshotVersion { found: u32, supported: u32 },

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Embedding provider failed: {0}")]
    Embedding(String),

    #[error("{operation} timed out after {after_ms} ms")]
    Timeout { operation: &'static str, after_ms: u64 },

    #[error("No snapshot has been installed")]
    NoActiveSnapshot,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
