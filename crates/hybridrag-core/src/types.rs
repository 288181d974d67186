//! Domain types used by the lexical, vector and fusion stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a chunk inside one corpus snapshot.
///
/// Ids are dense: a chunk's id equals its position in the snapshot, so lookups
/// are plain slice indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(pub u32);

impl ChunkId {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the corpus provider hands over: already chunked text plus where it came from.
///
/// - `text`: the chunk payload
/// - `source`: originating document (file name, URL, ...)
/// - `ordinal`: position of the chunk within its source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInput {
    pub text: String,
    pub source: String,
    pub ordinal: u32,
}

impl ChunkInput {
    pub fn new(text: impl Into<String>, source: impl Into<String>, ordinal: u32) -> Self {
        Self { text: text.into(), source: source.into(), ordinal }
    }
}

/// A stored chunk. Immutable once it is part of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub source: String,
    pub ordinal: u32,
}

/// Indicates which sub-index produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HitSource {
    Lexical,
    Vector,
}

/// Output of a single sub-index query. Higher `score` is always better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub source: HitSource,
}

/// Output of the fusion stage.
///
/// `lexical_score` / `vector_score` carry the raw sub-index score and are `None`
/// when that sub-index did not retrieve the chunk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusedHit {
    pub chunk_id: ChunkId,
    pub fused_score: f32,
    pub lexical_score: Option<f32>,
    pub vector_score: Option<f32>,
}

/// Final output after the pairwise reranker. Vector order is the ranking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankedHit {
    pub chunk_id: ChunkId,
    pub rerank_score: f32,
}

/// Answer returned by an external extractive QA model.
///
/// `span` is the `[start, end)` character range of `answer` inside the context
/// the extractor was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedAnswer {
    pub answer: String,
    pub confidence: f32,
    pub span: (usize, usize),
}

/// Orders scores descending with NaN sorted last, for use in `sort_by`.
/// `0.0` and `-0.0` compare equal so callers' tie-breaks apply.
pub fn descending(a: f32, b: f32) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal),
    }
}
