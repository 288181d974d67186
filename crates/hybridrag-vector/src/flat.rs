//! Exact cosine search: every row is L2-normalized once at build time, queries
//! are normalized the same way and scored by inner product against all rows.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use hybridrag_core::corpus::CorpusSnapshot;
use hybridrag_core::error::{Error, Result};
use hybridrag_core::traits::VectorSearch;
use hybridrag_core::types::{descending, ChunkId, HitSource, RankedHit};

/// Serialized form of a [`FlatIndex`]. `rows[i]` belongs to `ChunkId(i)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndexData {
    pub dim: usize,
    pub rows: Vec<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    // row-major, rows already unit length (or all zero)
    data: Vec<f32>,
}

impl FlatIndex {
    /// `embeddings[i]` must belong to the i-th chunk of `corpus`.
    #[instrument(skip_all, fields(chunks = corpus.len()))]
    pub fn build(corpus: &CorpusSnapshot, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if corpus.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        if embeddings.len() != corpus.len() {
            return Err(Error::DimensionMismatch {
                expected: corpus.len(),
                actual: embeddings.len(),
                position: embeddings.len().min(corpus.len()),
            });
        }
        let index = Self::from_rows(embeddings, true)?;
        debug!(dim = index.dim, rows = index.len(), "flat index built");
        Ok(index)
    }

    pub fn from_data(data: FlatIndexData, chunk_count: usize) -> Result<Self> {
        if data.rows.len() != chunk_count {
            return Err(Error::CorruptSnapshot(format!(
                "vector index holds {} rows for {chunk_count} chunks",
                data.rows.len()
            )));
        }
        // rows were normalized before they were stored
        let index = Self::from_rows(data.rows, false)?;
        if index.dim != data.dim {
            return Err(Error::CorruptSnapshot(format!(
                "vector index declares dimension {} but rows have {}",
                data.dim, index.dim
            )));
        }
        Ok(index)
    }

    pub fn to_data(&self) -> FlatIndexData {
        FlatIndexData { dim: self.dim, rows: self.data.chunks(self.dim).map(<[f32]>::to_vec).collect() }
    }

    fn from_rows(rows: Vec<Vec<f32>>, normalize: bool) -> Result<Self> {
        let dim = rows.first().map_or(0, Vec::len);
        if dim == 0 {
            return Err(Error::Embedding("embeddings must have at least one dimension".into()));
        }
        let mut data = Vec::with_capacity(rows.len() * dim);
        for (position, mut row) in rows.into_iter().enumerate() {
            if row.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, actual: row.len(), position });
            }
            if row.iter().any(|x| !x.is_finite()) {
                return Err(Error::Embedding(format!("embedding at position {position} has non-finite values")));
            }
            if normalize {
                l2_normalize(&mut row);
            }
            data.extend_from_slice(&row);
        }
        Ok(Self { dim, data })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Top-`k` rows by cosine similarity, descending, ties by ascending chunk id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RankedHit>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len(), position: 0 });
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut q = query.to_vec();
        l2_normalize(&mut q);

        let mut scored: Vec<(u32, f32)> = self
            .data
            .chunks(self.dim)
            .zip(0u32..)
            .map(|(row, id)| (id, dot(row, &q)))
            .collect();
        scored.sort_by(|a, b| descending(a.1, b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(id, score)| RankedHit { chunk_id: ChunkId(id), score, source: HitSource::Vector })
            .collect())
    }
}

impl VectorSearch for FlatIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    fn search_vec(&self, query: &[f32], k: usize) -> Result<Vec<RankedHit>> {
        self.search(query, k)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Zero vectors are left as they are.
fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybridrag_core::corpus::InvalidChunkPolicy;
    use hybridrag_core::types::ChunkInput;

    fn corpus(n: usize) -> CorpusSnapshot {
        let inputs = (0..n).map(|i| ChunkInput::new(format!("chunk {i}"), "doc", i as u32)).collect();
        CorpusSnapshot::admit(inputs, InvalidChunkPolicy::Abort).expect("corpus").corpus
    }

    fn ids(hits: &[RankedHit]) -> Vec<u32> {
        hits.iter().map(|h| h.chunk_id.0).collect()
    }

    #[test]
    fn ranks_by_cosine_not_magnitude() {
        let index = FlatIndex::build(
            &corpus(3),
            vec![vec![10.0, 0.0], vec![0.6, 0.8], vec![0.0, 0.1]],
        )
        .expect("build");
        let hits = index.search(&[0.0, 5.0], 3).expect("search");
        assert_eq!(ids(&hits), vec![2, 1, 0]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - 0.8).abs() < 1e-6);
        assert!(hits[2].score.abs() < 1e-6);
        assert!(hits.iter().all(|h| h.source == HitSource::Vector));
    }

    #[test]
    fn ties_break_by_ascending_id_and_k_truncates() {
        let index = FlatIndex::build(&corpus(4), vec![vec![1.0, 0.0]; 4]).expect("build");
        let hits = index.search(&[2.0, 0.0], 2).expect("search");
        assert_eq!(ids(&hits), vec![0, 1]);
        assert!(index.search(&[1.0, 0.0], 0).expect("k=0").is_empty());
    }

    #[test]
    fn zero_vectors_score_zero() {
        let index = FlatIndex::build(&corpus(2), vec![vec![0.0, 0.0], vec![1.0, 1.0]]).expect("build");
        let hits = index.search(&[0.0, 0.0], 2).expect("search");
        assert!(hits.iter().all(|h| h.score == 0.0));
        assert_eq!(ids(&hits), vec![0, 1]);
    }

    #[test]
    fn negative_zero_score_ties_with_zero() {
        // row 0 scores -0.0 and row 1 scores 0.0 against this query
        let index = FlatIndex::build(&corpus(2), vec![vec![0.0, 0.0], vec![1.0, -1.0]]).expect("build");
        let hits = index.search(&[-1.0, -1.0], 2).expect("search");
        assert_eq!(ids(&hits), vec![0, 1]);
    }

    #[test]
    fn inconsistent_rows_are_dimension_mismatch() {
        let err = FlatIndex::build(&corpus(3), vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0]])
            .expect_err("ragged rows");
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 1, position: 2 }), "got {err:?}");

        let err = FlatIndex::build(&corpus(3), vec![vec![1.0]; 2]).expect_err("missing row");
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2, .. }));
    }

    #[test]
    fn degenerate_embeddings_are_rejected() {
        assert!(matches!(FlatIndex::build(&corpus(1), vec![vec![]]), Err(Error::Embedding(_))));
        assert!(matches!(FlatIndex::build(&corpus(1), vec![vec![f32::NAN, 1.0]]), Err(Error::Embedding(_))));
    }

    #[test]
    fn wrong_query_length_is_rejected() {
        let index = FlatIndex::build(&corpus(1), vec![vec![1.0, 2.0, 3.0]]).expect("build");
        let err = index.search(&[1.0, 2.0], 1).expect_err("short query");
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2, position: 0 }));
    }

    #[test]
    fn data_round_trip_preserves_results() {
        let index = FlatIndex::build(&corpus(3), vec![vec![3.0, 4.0], vec![1.0, 0.0], vec![0.0, 2.0]]).expect("build");
        let data = index.to_data();
        assert_eq!(data.rows[0], vec![0.6, 0.8]);
        let restored = FlatIndex::from_data(data.clone(), 3).expect("restore");
        assert_eq!(
            index.search(&[1.0, 1.0], 3).expect("a"),
            restored.search(&[1.0, 1.0], 3).expect("b")
        );
        assert!(matches!(FlatIndex::from_data(data, 4), Err(Error::CorruptSnapshot(_))));
    }
}
