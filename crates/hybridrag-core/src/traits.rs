use crate::error::Result;
use crate::types::{ExtractedAnswer, RankedHit};

/// Embedding provider. Must return one vector per input, all of the same
/// dimension, and be deterministic for a given input.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Splits text into index terms. The same tokenizer must be used at build and
/// query time; `id` is recorded in persisted snapshots to enforce that.
pub trait Tokenizer: Send + Sync {
    fn id(&self) -> &str;
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Exact-term retrieval over a built corpus.
pub trait LexicalSearch: Send + Sync {
    fn search(&self, query: &str, k: usize) -> Vec<RankedHit>;
}

/// Dense-vector retrieval. The flat index is the default strategy; an
/// approximate index can stand in behind the same contract.
pub trait VectorSearch: Send + Sync {
    fn dim(&self) -> usize;
    fn search_vec(&self, query: &[f32], k: usize) -> Result<Vec<RankedHit>>;
}

/// Cross-encoder style relevance model scoring one `(query, passage)` pair.
/// Individual calls may fail.
pub trait PairwiseScorer: Send + Sync {
    fn score(&self, query: &str, passage: &str) -> anyhow::Result<f32>;
}

impl<F> PairwiseScorer for F
where
    F: Fn(&str, &str) -> anyhow::Result<f32> + Send + Sync,
{
    fn score(&self, query: &str, passage: &str) -> anyhow::Result<f32> {
        self(query, passage)
    }
}

/// Downstream extractive QA model.
pub trait AnswerExtractor: Send + Sync {
    fn extract(&self, question: &str, context: &str) -> anyhow::Result<ExtractedAnswer>;
}
