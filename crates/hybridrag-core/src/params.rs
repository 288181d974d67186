//! Tunable parameters for indexing and querying, with their validation rules.
//!
//! Every `validate` runs at call entry, before any index work starts.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// BM25 constants. `epsilon` scales the floor applied to negative idf values
/// (terms present in more than half the corpus).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
    pub epsilon: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75, epsilon: 0.25 }
    }
}

impl Bm25Params {
    pub fn validate(&self) -> Result<()> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(Error::config(format!("bm25.k1 must be a finite value >= 0, got {}", self.k1)));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(Error::config(format!("bm25.b must lie in [0, 1], got {}", self.b)));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(Error::config(format!("bm25.epsilon must be a finite value >= 0, got {}", self.epsilon)));
        }
        Ok(())
    }
}

/// How the lexical and vector rankings are merged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Max-normalize each list, then `alpha * lexical + (1 - alpha) * vector`.
    WeightedNormalization { alpha: f32 },
    /// Sum of `1 / (1 + rank)` over the lists a chunk appears in.
    ReciprocalRank,
}

impl Default for FusionStrategy {
    fn default() -> Self {
        Self::WeightedNormalization { alpha: 0.5 }
    }
}

impl FusionStrategy {
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::WeightedNormalization { alpha } if !(0.0..=1.0).contains(&alpha) => {
                Err(Error::config(format!("fusion alpha must lie in [0, 1], got {alpha}")))
            }
            _ => Ok(()),
        }
    }
}

/// Per-query knobs: candidate depth of each sub-index, the fused list length,
/// the fusion strategy and the final reranked length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    pub k_lexical: usize,
    pub k_vector: usize,
    pub k_merge: usize,
    pub fusion: FusionStrategy,
    pub k_rerank: usize,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            k_lexical: 40,
            k_vector: 40,
            k_merge: 20,
            fusion: FusionStrategy::default(),
            k_rerank: 5,
        }
    }
}

impl QueryParams {
    /// Sub-index depth of twice the merged length, the way the hybrid search
    /// over-fetches before fusing.
    pub fn with_merge(k_merge: usize) -> Self {
        let depth = k_merge.saturating_mul(2);
        Self { k_lexical: depth, k_vector: depth, k_merge, ..Self::default() }
    }

    pub fn with_fusion(mut self, fusion: FusionStrategy) -> Self {
        self.fusion = fusion;
        self
    }

    pub fn with_rerank(mut self, k_rerank: usize) -> Self {
        self.k_rerank = k_rerank;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.k_merge == 0 {
            return Err(Error::config("k_merge must be greater than 0"));
        }
        if self.k_rerank == 0 {
            return Err(Error::config("k_rerank must be greater than 0"));
        }
        if self.k_lexical == 0 && self.k_vector == 0 {
            return Err(Error::config("at least one of k_lexical / k_vector must be greater than 0"));
        }
        self.fusion.validate()
    }
}
