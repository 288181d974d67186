use std::time::{Duration, Instant};

use hybridrag_core::error::Result;
use hybridrag_core::params::QueryParams;
use hybridrag_core::traits::{LexicalSearch, VectorSearch};
use hybridrag_core::types::FusedHit;

use crate::fusion::fuse;

/// First retrieval stage over any pair of sub-indexes: query both, then fuse.
pub struct HybridRetriever<'a, L, V>
where
    L: LexicalSearch + ?Sized,
    V: VectorSearch + ?Sized,
{
    lexical: &'a L,
    vector: &'a V,
}

/// Fused candidates plus the time spent in each retrieval stage.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub fused: Vec<FusedHit>,
    pub lexical: Duration,
    pub vector: Duration,
    pub fusion: Duration,
}

impl<'a, L, V> HybridRetriever<'a, L, V>
where
    L: LexicalSearch + ?Sized,
    V: VectorSearch + ?Sized,
{
    pub fn new(lexical: &'a L, vector: &'a V) -> Self {
        Self { lexical, vector }
    }

    /// `query_vec` may be `None` only when `params.k_vector == 0`.
    pub fn retrieve(&self, question: &str, query_vec: Option<&[f32]>, params: &QueryParams) -> Result<Retrieval> {
        let started = Instant::now();
        let lexical_hits = if params.k_lexical > 0 { self.lexical.search(question, params.k_lexical) } else { Vec::new() };
        let lexical = started.elapsed();

        let started = Instant::now();
        let vector_hits = match query_vec {
            Some(q) if params.k_vector > 0 => self.vector.search_vec(q, params.k_vector)?,
            _ => Vec::new(),
        };
        let vector = started.elapsed();

        let started = Instant::now();
        let fused = fuse(&lexical_hits, &vector_hits, &params.fusion, params.k_merge);
        Ok(Retrieval { fused, lexical, vector, fusion: started.elapsed() })
    }
}
