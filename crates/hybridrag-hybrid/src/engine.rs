//! Engine facade: owns the collaborators, builds and swaps snapshots, and runs
//! the query pipeline (retrieve, fuse, rerank) plus the answer hand-off.
//!
//! External model calls run on the engine's own runtime, each on the blocking
//! pool under a deadline. The public API is synchronous; do not call it from
//! inside another tokio runtime.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::runtime::Runtime;
use tracing::{debug, info, instrument, warn};

use hybridrag_core::config::{Config, EngineConfig};
use hybridrag_core::corpus::{Admitted, CorpusSnapshot};
use hybridrag_core::error::{Error, Result};
use hybridrag_core::params::QueryParams;
use hybridrag_core::traits::{AnswerExtractor, Embedder, PairwiseScorer, Tokenizer};
use hybridrag_core::types::{Chunk, ChunkInput, ExtractedAnswer, FusedHit, RerankedHit};

use crate::context::assemble_context;
use crate::rerank::rerank_with_timeout;
use crate::retrieval::HybridRetriever;
use crate::snapshot::{IndexSnapshot, SnapshotHandle};

/// Wall-clock time per query stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryTimings {
    pub embed: Duration,
    pub lexical: Duration,
    pub vector: Duration,
    pub fusion: Duration,
    pub rerank: Duration,
    pub total: Duration,
}

#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub hits: Vec<RerankedHit>,
    /// Fused candidates handed to the reranker.
    pub fused: Vec<FusedHit>,
    pub timings: QueryTimings,
}

/// A reranked hit with the chunk it points at.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedHit {
    pub hit: RerankedHit,
    pub chunk: Chunk,
}

#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub answer: ExtractedAnswer,
    pub context: String,
    pub sources: Vec<SourcedHit>,
}

pub struct HybridEngine {
    config: EngineConfig,
    tokenizer: Arc<dyn Tokenizer>,
    embedder: Arc<dyn Embedder>,
    scorer: Arc<dyn PairwiseScorer>,
    runtime: Runtime,
    active: RwLock<Option<SnapshotHandle>>,
    build_lock: Mutex<()>,
    next_generation: AtomicU64,
}

impl HybridEngine {
    pub fn new(
        config: EngineConfig,
        tokenizer: Arc<dyn Tokenizer>,
        embedder: Arc<dyn Embedder>,
        scorer: Arc<dyn PairwiseScorer>,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.runtime.worker_threads)
            .thread_name("hybridrag-worker")
            .enable_all()
            .build()?;
        Ok(Self {
            config,
            tokenizer,
            embedder,
            scorer,
            runtime,
            active: RwLock::new(None),
            build_lock: Mutex::new(()),
            next_generation: AtomicU64::new(1),
        })
    }

    pub fn from_config(
        config: &Config,
        tokenizer: Arc<dyn Tokenizer>,
        embedder: Arc<dyn Embedder>,
        scorer: Arc<dyn PairwiseScorer>,
    ) -> Result<Self> {
        Self::new(config.engine()?, tokenizer, embedder, scorer)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Query parameters from the configuration.
    pub fn default_params(&self) -> QueryParams {
        self.config.query
    }

    /// Builds a snapshot without installing it. `embeddings[i]` belongs to
    /// `inputs[i]`; embeddings of skipped chunks are dropped with them.
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub fn build_index(&self, inputs: Vec<ChunkInput>, embeddings: Vec<Vec<f32>>) -> Result<SnapshotHandle> {
        if embeddings.len() != inputs.len() {
            return Err(Error::DimensionMismatch {
                expected: inputs.len(),
                actual: embeddings.len(),
                position: embeddings.len().min(inputs.len()),
            });
        }
        let Admitted { corpus, accepted } = CorpusSnapshot::admit(inputs, self.config.build.invalid_chunk_policy)?;
        let embeddings = embeddings
            .into_iter()
            .enumerate()
            .filter(|(position, _)| accepted.binary_search(position).is_ok())
            .map(|(_, v)| v)
            .collect();
        self.build_admitted(corpus, embeddings, &accepted)
    }

    /// Builds and installs a snapshot. Builds are serialized; queries keep
    /// running against the previous snapshot until the swap.
    pub fn rebuild(&self, inputs: Vec<ChunkInput>, embeddings: Vec<Vec<f32>>) -> Result<SnapshotHandle> {
        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.build_index(inputs, embeddings)?;
        self.install(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Like [`HybridEngine::rebuild`], embedding the chunk texts through the
    /// configured embedder first.
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub fn rebuild_with_embedder(&self, inputs: Vec<ChunkInput>) -> Result<SnapshotHandle> {
        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let Admitted { corpus, accepted } = CorpusSnapshot::admit(inputs, self.config.build.invalid_chunk_policy)?;
        let texts = corpus.iter().map(|c| c.text.clone()).collect();
        let started = Instant::now();
        let embeddings = self.embed(texts)?;
        debug!(chunks = corpus.len(), elapsed_ms = started.elapsed().as_millis() as u64, "corpus embedded");
        let snapshot = self.build_admitted(corpus, embeddings, &accepted)?;
        self.install(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    fn build_admitted(
        &self,
        corpus: CorpusSnapshot,
        embeddings: Vec<Vec<f32>>,
        accepted: &[usize],
    ) -> Result<SnapshotHandle> {
        let expected = self.embedder.dim();
        if let Some((i, v)) = embeddings.iter().enumerate().find(|(_, v)| v.len() != expected) {
            return Err(Error::DimensionMismatch {
                expected,
                actual: v.len(),
                position: accepted.get(i).copied().unwrap_or(i),
            });
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let snapshot =
            IndexSnapshot::build(generation, corpus, embeddings, self.config.bm25, Arc::clone(&self.tokenizer))?;
        Ok(Arc::new(snapshot))
    }

    /// Makes `snapshot` the active one and returns the snapshot it replaced.
    pub fn install(&self, snapshot: SnapshotHandle) -> Option<SnapshotHandle> {
        self.next_generation.fetch_max(snapshot.generation() + 1, Ordering::Relaxed);
        info!(generation = snapshot.generation(), chunks = snapshot.corpus().len(), "snapshot installed");
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        active.replace(snapshot)
    }

    pub fn current(&self) -> Result<SnapshotHandle> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Arc::clone)
            .ok_or(Error::NoActiveSnapshot)
    }

    /// Saves the active snapshot to `storage.snapshot_path` resolved against `base`.
    pub fn save_current(&self, base: &Path) -> Result<PathBuf> {
        let snapshot = self.current()?;
        let path = self.config.storage.resolve(base);
        snapshot.save(&path)?;
        Ok(path)
    }

    /// Loads the snapshot at `storage.snapshot_path` (resolved against `base`) and installs it.
    pub fn restore(&self, base: &Path) -> Result<SnapshotHandle> {
        let path = self.config.storage.resolve(base);
        let snapshot = IndexSnapshot::load(&path, Arc::clone(&self.tokenizer))?;
        if snapshot.vector().dim() != self.embedder.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.embedder.dim(),
                actual: snapshot.vector().dim(),
                position: 0,
            });
        }
        let snapshot = Arc::new(snapshot);
        self.install(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub fn query(&self, snapshot: &IndexSnapshot, question: &str, params: &QueryParams) -> Result<Vec<RerankedHit>> {
        self.query_detailed(snapshot, question, params).map(|outcome| outcome.hits)
    }

    #[instrument(skip_all, fields(generation = snapshot.generation(), k_merge = params.k_merge))]
    pub fn query_detailed(&self, snapshot: &IndexSnapshot, question: &str, params: &QueryParams) -> Result<QueryOutcome> {
        params.validate()?;
        let total = Instant::now();

        let started = Instant::now();
        let query_vec = if params.k_vector > 0 { Some(self.embed_query(question)?) } else { None };
        let embed = started.elapsed();

        let retrieval =
            HybridRetriever::new(snapshot.lexical(), snapshot.vector()).retrieve(question, query_vec.as_deref(), params)?;

        let started = Instant::now();
        let hits = self.runtime.block_on(rerank_with_timeout(
            question,
            &retrieval.fused,
            snapshot.corpus(),
            Arc::clone(&self.scorer),
            params.k_rerank,
            Duration::from_millis(self.config.timeouts.rerank_ms),
        ));
        let timings = QueryTimings {
            embed,
            lexical: retrieval.lexical,
            vector: retrieval.vector,
            fusion: retrieval.fusion,
            rerank: started.elapsed(),
            total: total.elapsed(),
        };
        debug!(fused = retrieval.fused.len(), hits = hits.len(), ?timings, "query finished");
        Ok(QueryOutcome { hits, fused: retrieval.fused, timings })
    }

    /// Runs the query, assembles the context from the reranked chunks and asks
    /// `extractor` for an answer. `None` when nothing was retrieved or the
    /// extractor failed.
    #[instrument(skip_all, fields(generation = snapshot.generation()))]
    pub fn answer(
        &self,
        snapshot: &IndexSnapshot,
        question: &str,
        params: &QueryParams,
        extractor: Arc<dyn AnswerExtractor>,
    ) -> Result<Option<AnswerOutcome>> {
        let hits = self.query(snapshot, question, params)?;
        let sources: Vec<SourcedHit> = hits
            .iter()
            .filter_map(|hit| snapshot.corpus().get(hit.chunk_id).map(|chunk| SourcedHit { hit: *hit, chunk: chunk.clone() }))
            .collect();
        if sources.is_empty() {
            return Ok(None);
        }
        let context = assemble_context(
            sources.iter().map(|s| s.chunk.text.as_str()),
            &self.config.context.separator,
            self.config.context.char_budget,
        );

        let q = question.to_owned();
        let ctx = context.clone();
        let extracted = match self.call_blocking("answer extraction", self.config.timeouts.extract_ms, move || {
            extractor.extract(&q, &ctx)
        }) {
            Ok(result) => result,
            Err(_) => return Ok(None),
        };
        match extracted {
            Ok(answer) => Ok(Some(AnswerOutcome { answer, context, sources })),
            Err(e) => {
                warn!(error = %e, "answer extraction failed");
                Ok(None)
            }
        }
    }

    fn embed_query(&self, question: &str) -> Result<Vec<f32>> {
        self.embed(vec![question.to_owned()])?
            .pop()
            .ok_or_else(|| Error::Embedding("no vector returned for the query".into()))
    }

    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let count = texts.len();
        let embedder = Arc::clone(&self.embedder);
        let vectors = self
            .call_blocking("embedding", self.config.timeouts.embed_ms, move || embedder.embed_batch(&texts))?
            .map_err(|e| Error::Embedding(format!("{e:#}")))?;
        if vectors.len() != count {
            return Err(Error::Embedding(format!("provider returned {} vectors for {count} texts", vectors.len())));
        }
        Ok(vectors)
    }

    /// Runs `f` on the blocking pool with a deadline. The outer error is the
    /// timeout; the inner result is the call's own outcome.
    fn call_blocking<T, F>(&self, operation: &'static str, after_ms: u64, f: F) -> Result<anyhow::Result<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let call = async move {
            tokio::time::timeout(Duration::from_millis(after_ms), tokio::task::spawn_blocking(f)).await
        };
        match self.runtime.block_on(call) {
            Ok(joined) => Ok(joined.map_err(anyhow::Error::from).and_then(|result| result)),
            Err(_) => {
                warn!(operation, after_ms, "external call timed out");
                Err(Error::Timeout { operation, after_ms })
            }
        }
    }
}
