//! Merges the lexical and vector rankings into one list.
//!
//! Both strategies walk the union of chunk ids in first-seen order (the lexical
//! list first, then the vector list) and finish with a stable descending sort,
//! so equal fused scores keep union order.

use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

use hybridrag_core::params::FusionStrategy;
use hybridrag_core::types::{descending, ChunkId, FusedHit, RankedHit};

/// Every id from `lexical` followed by the ids of `vector` not seen yet.
pub fn union_in_first_seen_order(lexical: &[RankedHit], vector: &[RankedHit]) -> Vec<ChunkId> {
    let mut seen = HashSet::with_capacity(lexical.len() + vector.len());
    let mut order = Vec::with_capacity(lexical.len() + vector.len());
    for hit in lexical.iter().chain(vector) {
        if seen.insert(hit.chunk_id) {
            order.push(hit.chunk_id);
        }
    }
    order
}

/// Divides every score by the list maximum. A maximum that is not strictly
/// positive leaves all scores at 0.
pub fn normalize_by_max(hits: &[RankedHit]) -> Vec<f32> {
    let max = hits.iter().map(|h| h.score).filter(|s| s.is_finite()).fold(f32::NEG_INFINITY, f32::max);
    if max > 0.0 {
        hits.iter().map(|h| h.score / max).collect()
    } else {
        vec![0.0; hits.len()]
    }
}

/// Per-list view keyed by chunk id: `(rank, raw score, normalized score)`.
/// A duplicate id inside one list keeps its first (best ranked) entry.
fn index_list(hits: &[RankedHit]) -> HashMap<ChunkId, (usize, f32, f32)> {
    let normalized = normalize_by_max(hits);
    let mut by_id = HashMap::with_capacity(hits.len());
    for (rank, (hit, norm)) in hits.iter().zip(normalized).enumerate() {
        by_id.entry(hit.chunk_id).or_insert((rank, hit.score, norm));
    }
    by_id
}

#[instrument(skip_all, fields(lexical = lexical.len(), vector = vector.len(), k_merge))]
pub fn fuse(lexical: &[RankedHit], vector: &[RankedHit], strategy: &FusionStrategy, k_merge: usize) -> Vec<FusedHit> {
    let lex = index_list(lexical);
    let dense = index_list(vector);

    let mut fused: Vec<FusedHit> = union_in_first_seen_order(lexical, vector)
        .into_iter()
        .map(|chunk_id| {
            let l = lex.get(&chunk_id);
            let v = dense.get(&chunk_id);
            let fused_score = match *strategy {
                FusionStrategy::WeightedNormalization { alpha } => {
                    alpha * l.map_or(0.0, |e| e.2) + (1.0 - alpha) * v.map_or(0.0, |e| e.2)
                }
                FusionStrategy::ReciprocalRank => {
                    [l, v].into_iter().flatten().map(|e| 1.0 / (1.0 + e.0 as f32)).sum()
                }
            };
            FusedHit { chunk_id, fused_score, lexical_score: l.map(|e| e.1), vector_score: v.map(|e| e.1) }
        })
        .collect();

    let union = fused.len();
    // sort_by is stable: ties keep union order
    fused.sort_by(|a, b| descending(a.fused_score, b.fused_score));
    fused.truncate(k_merge);
    debug!(union, kept = fused.len(), "fused rankings");
    fused
}
