use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use hybridrag_core::params::Bm25Params;
use hybridrag_core::traits::{LexicalSearch, Tokenizer};
use hybridrag_core::types::{descending, ChunkId, HitSource, RankedHit};
use hybridrag_core::{CorpusSnapshot, Error, Result};

/// One occurrence record: `chunk_id` contains the term `term_frequency` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
	pub chunk_id: ChunkId,
	pub term_frequency: u32,
}

#[derive(Debug, Clone)]
struct TermEntry {
	idf: f32,
	postings: Vec<Posting>,
}

/// Persistable form of a [`LexicalIndex`]. Idf values are derived, so only the
/// raw statistics are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalIndexData {
	pub tokenizer_id: String,
	pub params: Bm25Params,
	pub postings: BTreeMap<String, Vec<Posting>>,
	pub chunk_lengths: Vec<u32>,
}

/// BM25 (Okapi) index over a corpus snapshot.
///
/// Owns its tokenizer so queries are always tokenized exactly like the corpus was.
pub struct LexicalIndex {
	terms: BTreeMap<String, TermEntry>,
	chunk_lengths: Vec<u32>,
	avg_len: f32,
	params: Bm25Params,
	tokenizer: Arc<dyn Tokenizer>,
}

impl fmt::Debug for LexicalIndex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LexicalIndex")
			.field("terms", &self.terms.len())
			.field("chunks", &self.chunk_lengths.len())
			.field("avg_len", &self.avg_len)
			.field("params", &self.params)
			.field("tokenizer", &self.tokenizer.id())
			.finish()
	}
}

impl LexicalIndex {
	#[instrument(skip_all, fields(chunks = corpus.len(), tokenizer = tokenizer.id()))]
	pub fn build(corpus: &CorpusSnapshot, params: Bm25Params, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
		params.validate()?;
		if corpus.is_empty() { return Err(Error::EmptyCorpus); }
		let mut postings: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
		let mut chunk_lengths = Vec::with_capacity(corpus.len());
		for chunk in corpus.iter() {
			let tokens = tokenizer.tokenize(&chunk.text);
			chunk_lengths.push(token_length(chunk.id.as_usize(), tokens.len())?);
			let mut frequencies: HashMap<String, u32> = HashMap::new();
			for token in tokens { *frequencies.entry(token).or_insert(0) += 1; }
			for (term, term_frequency) in frequencies {
				postings.entry(term).or_default().push(Posting { chunk_id: chunk.id, term_frequency });
			}
		}
		// chunks are visited in id order, so every posting list is already sorted
		let index = Self::assemble(postings, chunk_lengths, params, tokenizer);
		debug!(terms = index.terms.len(), avg_len = index.avg_len, "lexical index built");
		Ok(index)
	}

	/// Rebuilds an index from persisted statistics. Fails if `tokenizer` is not
	/// the one the data was built with.
	pub fn from_data(data: LexicalIndexData, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
		if data.tokenizer_id != tokenizer.id() {
			return Err(Error::config(format!(
				"snapshot was tokenized with '{}' but '{}' was supplied",
				data.tokenizer_id,
				tokenizer.id()
			)));
		}
		data.params.validate()?;
		if data.chunk_lengths.is_empty() { return Err(Error::EmptyCorpus); }
		let n = data.chunk_lengths.len();
		for (term, list) in &data.postings {
			let in_range = list.iter().all(|p| p.chunk_id.as_usize() < n && p.term_frequency > 0);
			let ordered = list.windows(2).all(|w| w[0].chunk_id < w[1].chunk_id);
			if list.is_empty() || !in_range || !ordered {
				return Err(Error::CorruptSnapshot(format!("posting list for term '{term}' is malformed")));
			}
		}
		Ok(Self::assemble(data.postings, data.chunk_lengths, data.params, tokenizer))
	}

	pub fn to_data(&self) -> LexicalIndexData {
		LexicalIndexData {
			tokenizer_id: self.tokenizer.id().to_string(),
			params: self.params,
			postings: self.terms.iter().map(|(t, e)| (t.clone(), e.postings.clone())).collect(),
			chunk_lengths: self.chunk_lengths.clone(),
		}
	}

	fn assemble(
		postings: BTreeMap<String, Vec<Posting>>,
		chunk_lengths: Vec<u32>,
		params: Bm25Params,
		tokenizer: Arc<dyn Tokenizer>,
	) -> Self {
		let n = chunk_lengths.len() as f64;
		let total: u64 = chunk_lengths.iter().map(|&l| u64::from(l)).sum();
		let avg_len = (total as f64 / n) as f32;

		// Okapi idf; negative values (terms in more than half of the chunks) are
		// floored to epsilon * mean idf over the vocabulary.
		let mut terms: BTreeMap<String, TermEntry> = postings
			.into_iter()
			.map(|(term, postings)| {
				let df = postings.len() as f64;
				let idf = ((n - df + 0.5) / (df + 0.5)).ln() as f32;
				(term, TermEntry { idf, postings })
			})
			.collect();
		if !terms.is_empty() {
			let mean_idf = terms.values().map(|e| f64::from(e.idf)).sum::<f64>() / terms.len() as f64;
			let floor = params.epsilon * mean_idf as f32;
			for entry in terms.values_mut().filter(|e| e.idf < 0.0) { entry.idf = floor; }
		}
		Self { terms, chunk_lengths, avg_len, params, tokenizer }
	}

	/// BM25 top-k for `query`. Ties are broken by ascending chunk id.
	pub fn search(&self, query: &str, k: usize) -> Vec<RankedHit> {
		if k == 0 { return Vec::new(); }
		let tokens = self.tokenizer.tokenize(query);
		if tokens.is_empty() { return Vec::new(); }

		let Bm25Params { k1, b, .. } = self.params;
		let mut scores: HashMap<ChunkId, f32> = HashMap::new();
		for token in &tokens {
			let Some(entry) = self.terms.get(token) else { continue };
			for posting in &entry.postings {
				let tf = posting.term_frequency as f32;
				let len = self.chunk_lengths[posting.chunk_id.as_usize()] as f32;
				let relative_len = if self.avg_len > 0.0 { len / self.avg_len } else { 0.0 };
				let score = entry.idf * tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * relative_len));
				*scores.entry(posting.chunk_id).or_insert(0.0) += score;
			}
		}

		let mut hits: Vec<RankedHit> = scores
			.into_iter()
			.map(|(chunk_id, score)| RankedHit { chunk_id, score, source: HitSource::Lexical })
			.collect();
		hits.sort_by(|a, b| descending(a.score, b.score).then(a.chunk_id.cmp(&b.chunk_id)));
		hits.truncate(k);
		debug!(terms = tokens.len(), hits = hits.len(), "lexical search");
		hits
	}

	pub fn idf(&self, term: &str) -> Option<f32> {
		self.terms.get(term).map(|e| e.idf)
	}

	pub fn doc_freq(&self, term: &str) -> usize {
		self.terms.get(term).map_or(0, |e| e.postings.len())
	}

	pub fn vocabulary_len(&self) -> usize { self.terms.len() }

	pub fn avg_len(&self) -> f32 { self.avg_len }

	pub fn chunk_count(&self) -> usize { self.chunk_lengths.len() }

	pub fn params(&self) -> Bm25Params { self.params }

	pub fn tokenizer_id(&self) -> &str { self.tokenizer.id() }

	pub fn tokenizer(&self) -> Arc<dyn Tokenizer> { Arc::clone(&self.tokenizer) }
}

/// Chunk lengths are stored as `u32`; longer chunks are rejected rather than clamped.
fn token_length(position: usize, count: usize) -> Result<u32> {
	u32::try_from(count).map_err(|_| Error::InvalidChunk {
		position,
		reason: format!("chunk has {count} tokens, more than {} are not indexable", u32::MAX),
	})
}

impl LexicalSearch for LexicalIndex {
	fn search(&self, query: &str, k: usize) -> Vec<RankedHit> { Self::search(self, query, k) }
}
