//! Deterministic stand-ins for the external models: a hashing embedder and a
//! word-overlap pairwise scorer. Fast, dependency-free, and reproducible, which
//! is what tests and local development need from them.

use anyhow::{anyhow, Result};
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use hybridrag_core::traits::{Embedder, PairwiseScorer};

pub const DEFAULT_DIM: usize = 384;

/// Feature-hashing embedder: every normalized token lands in one of `dim`
/// buckets; the vector is L2-normalized.
#[derive(Debug, Clone)]
pub struct HashEmbedder { dim: usize }

impl HashEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 { return Err(anyhow!("embedding dimension must be greater than 0")); }
        Ok(Self { dim })
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in normalized_tokens(text).enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self { Self { dim: DEFAULT_DIM } }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tracing::trace!(batch = texts.len(), dim = self.dim, "hash embedding");
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Scores a passage by the share of query words it contains, with a bonus when
/// the whole query appears verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapScorer;

impl PairwiseScorer for OverlapScorer {
    fn score(&self, query: &str, passage: &str) -> Result<f32> {
        let query_words: Vec<String> = normalized_tokens(query).collect();
        if query_words.is_empty() { return Err(anyhow!("query has no scorable words")); }
        let passage_words: Vec<String> = normalized_tokens(passage).collect();
        let matched = query_words.iter().filter(|w| passage_words.contains(w)).count();
        let phrase_bonus = if passage.to_lowercase().contains(&query.trim().to_lowercase()) { 0.5 } else { 0.0 };
        Ok(matched as f32 / query_words.len() as f32 + phrase_bonus)
    }
}

fn normalized_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}
