//! Corpus store: the immutable, ordered set of chunks one index generation is built from.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkId, ChunkInput};

/// What to do with a chunk whose text or source is empty or whitespace-only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidChunkPolicy {
    /// Fail the whole build with `Error::InvalidChunk`.
    #[default]
    Abort,
    /// Drop the chunk (and its embedding) and keep going.
    Skip,
}

/// Ordered, owned sequence of chunks. Replaced wholesale on rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    chunks: Vec<Chunk>,
}

/// Result of admitting provider input into a snapshot.
///
/// `accepted[i]` is the provider position of the chunk that received id `i`;
/// callers use it to keep externally supplied embeddings aligned after skips.
#[derive(Debug, Clone)]
pub struct Admitted {
    pub corpus: CorpusSnapshot,
    pub accepted: Vec<usize>,
}

impl CorpusSnapshot {
    /// Assigns ids in provider order, applying `policy` to invalid chunks.
    ///
    /// An empty result (no input, or everything skipped) is `Error::EmptyCorpus`.
    pub fn admit(inputs: Vec<ChunkInput>, policy: InvalidChunkPolicy) -> Result<Admitted> {
        let total = inputs.len();
        let mut chunks = Vec::with_capacity(total);
        let mut accepted = Vec::with_capacity(total);
        for (position, input) in inputs.into_iter().enumerate() {
            if let Some(reason) = validate_input(&input) {
                match policy {
                    InvalidChunkPolicy::Abort => return Err(Error::InvalidChunk { position, reason }),
                    InvalidChunkPolicy::Skip => {
                        warn!(position, source = %input.source, %reason, "skipping invalid chunk");
                        continue;
                    }
                }
            }
            let id = u32::try_from(chunks.len())
                .map_err(|_| Error::config("corpus exceeds u32::MAX chunks"))?;
            chunks.push(Chunk { id: ChunkId(id), text: input.text, source: input.source, ordinal: input.ordinal });
            accepted.push(position);
        }
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        debug!(chunks = chunks.len(), skipped = total - accepted.len(), "corpus admitted");
        Ok(Admitted { corpus: Self { chunks }, accepted })
    }

    /// Checks the dense-id invariant on chunks coming back from storage.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        for (position, chunk) in chunks.iter().enumerate() {
            if chunk.id.as_usize() != position {
                return Err(Error::CorruptSnapshot(format!(
                    "chunk at position {position} carries id {}",
                    chunk.id
                )));
            }
        }
        Ok(Self { chunks })
    }

    pub fn get(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(id.as_usize())
    }

    pub fn text(&self, id: ChunkId) -> Option<&str> {
        self.get(id).map(|c| c.text.as_str())
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

fn validate_input(input: &ChunkInput) -> Option<String> {
    if input.text.trim().is_empty() {
        Some("chunk text is empty".to_string())
    } else if input.source.trim().is_empty() {
        Some("chunk source is empty".to_string())
    } else {
        None
    }
}
