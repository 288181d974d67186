//! Reranking adapter: rescores fused candidates with a pairwise relevance model.
//!
//! A scorer failure only drops the candidate it happened on. The remaining
//! candidates are ordered by the new score, equal scores keeping input order.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use hybridrag_core::corpus::CorpusSnapshot;
use hybridrag_core::traits::PairwiseScorer;
use hybridrag_core::types::{descending, ChunkId, FusedHit, RerankedHit};

#[instrument(skip_all, fields(candidates = candidates.len(), k_rerank))]
pub fn rerank(
    query: &str,
    candidates: &[FusedHit],
    corpus: &CorpusSnapshot,
    scorer: &dyn PairwiseScorer,
    k_rerank: usize,
) -> Vec<RerankedHit> {
    let scores = candidates.iter().map(|c| {
        let text = corpus.text(c.chunk_id)?;
        accept(c.chunk_id, scorer.score(query, text))
    });
    let scored = candidates.iter().zip(scores).filter_map(|(c, s)| s.map(|s| (c.chunk_id, s))).collect();
    finish(scored, candidates.len(), k_rerank)
}

/// Same contract as [`rerank`], but every scorer call runs on the blocking pool
/// under its own deadline. Calls for one query run concurrently; a call that
/// misses the deadline is treated as failed and is left to finish in the
/// background.
#[instrument(skip_all, fields(candidates = candidates.len(), k_rerank, timeout_ms = timeout.as_millis() as u64))]
pub async fn rerank_with_timeout(
    query: &str,
    candidates: &[FusedHit],
    corpus: &CorpusSnapshot,
    scorer: Arc<dyn PairwiseScorer>,
    k_rerank: usize,
    timeout: Duration,
) -> Vec<RerankedHit> {
    let calls = candidates.iter().map(|c| {
        let chunk_id = c.chunk_id;
        let text = corpus.text(chunk_id).map(str::to_owned);
        let query = query.to_owned();
        let scorer = Arc::clone(&scorer);
        async move {
            let Some(text) = text else {
                warn!(%chunk_id, "candidate missing from corpus, dropping");
                return None;
            };
            let call = tokio::task::spawn_blocking(move || scorer.score(&query, &text));
            match tokio::time::timeout(timeout, call).await {
                Ok(Ok(result)) => accept(chunk_id, result),
                Ok(Err(join_err)) => {
                    warn!(%chunk_id, error = %join_err, "scorer task failed, dropping candidate");
                    None
                }
                Err(_) => {
                    warn!(%chunk_id, "scorer timed out, dropping candidate");
                    None
                }
            }
        }
    });
    let scores = join_all(calls).await;
    let scored = candidates.iter().zip(scores).filter_map(|(c, s)| s.map(|s| (c.chunk_id, s))).collect();
    finish(scored, candidates.len(), k_rerank)
}

fn accept(chunk_id: ChunkId, result: anyhow::Result<f32>) -> Option<f32> {
    match result {
        Ok(score) if score.is_finite() => Some(score),
        Ok(score) => {
            warn!(%chunk_id, score, "scorer returned a non-finite score, dropping candidate");
            None
        }
        Err(e) => {
            warn!(%chunk_id, error = %e, "scorer failed, dropping candidate");
            None
        }
    }
}

fn finish(mut scored: Vec<(ChunkId, f32)>, total: usize, k_rerank: usize) -> Vec<RerankedHit> {
    let dropped = total - scored.len();
    scored.sort_by(|a, b| descending(a.1, b.1));
    scored.truncate(k_rerank);
    debug!(dropped, kept = scored.len(), "reranked");
    scored.into_iter().map(|(chunk_id, rerank_score)| RerankedHit { chunk_id, rerank_score }).collect()
}
