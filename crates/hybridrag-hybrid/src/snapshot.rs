//! Immutable index bundle (corpus + lexical + vector) and its on-disk format.
//!
//! A saved snapshot is one file: a single-line JSON header followed by the JSON
//! body. The header is read on its own, so version and checksum problems are
//! reported before the body is parsed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{info, instrument, warn};

use hybridrag_core::corpus::CorpusSnapshot;
use hybridrag_core::error::{Error, Result};
use hybridrag_core::params::Bm25Params;
use hybridrag_core::traits::Tokenizer;
use hybridrag_text::{LexicalIndex, LexicalIndexData};
use hybridrag_vector::{FlatIndex, FlatIndexData};

pub const SNAPSHOT_FORMAT: &str = "hybridrag-snapshot";
/// Version written by this build.
pub const SCHEMA_VERSION: u32 = 1;
/// Oldest schema version this build can still read.
pub const MIN_COMPATIBLE_VERSION: u32 = 1;

pub type SnapshotHandle = Arc<IndexSnapshot>;

#[derive(Debug)]
pub struct IndexSnapshot {
    generation: u64,
    built_at: DateTime<Utc>,
    corpus: CorpusSnapshot,
    lexical: LexicalIndex,
    vector: FlatIndex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub format: String,
    pub schema_version: u32,
    /// Oldest reader version able to load this file.
    pub min_compatible_version: u32,
    pub created_at: DateTime<Utc>,
    pub built_at: DateTime<Utc>,
    pub generation: u64,
    pub chunk_count: usize,
    pub dim: usize,
    pub tokenizer_id: String,
    /// blake3 hex digest of the body bytes.
    pub checksum: String,
}

impl SnapshotHeader {
    pub fn is_compatible(&self) -> bool {
        compatible(self.schema_version, self.min_compatible_version)
    }
}

/// The header fields every schema version keeps, read before the rest.
#[derive(Deserialize)]
struct HeaderVersion {
    #[serde(default)]
    format: String,
    #[serde(default)]
    schema_version: u32,
    #[serde(default)]
    min_compatible_version: u32,
}

fn compatible(schema_version: u32, min_compatible_version: u32) -> bool {
    min_compatible_version <= SCHEMA_VERSION && schema_version >= MIN_COMPATIBLE_VERSION
}

#[derive(Serialize)]
struct BodyRef<'a> {
    corpus: &'a CorpusSnapshot,
    lexical: LexicalIndexData,
    vector: FlatIndexData,
}

#[derive(Deserialize)]
struct Body {
    corpus: CorpusSnapshot,
    lexical: LexicalIndexData,
    vector: FlatIndexData,
}

impl IndexSnapshot {
    /// Builds both indexes. `embeddings[i]` must belong to chunk `i` of `corpus`.
    #[instrument(skip_all, fields(generation = generation, chunks = corpus.len()))]
    pub fn build(
        generation: u64,
        corpus: CorpusSnapshot,
        embeddings: Vec<Vec<f32>>,
        bm25: Bm25Params,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self> {
        let lexical = LexicalIndex::build(&corpus, bm25, tokenizer)?;
        let vector = FlatIndex::build(&corpus, embeddings)?;
        Ok(Self { generation, built_at: Utc::now(), corpus, lexical, vector })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn corpus(&self) -> &CorpusSnapshot {
        &self.corpus
    }

    pub fn lexical(&self) -> &LexicalIndex {
        &self.lexical
    }

    pub fn vector(&self) -> &FlatIndex {
        &self.vector
    }

    /// Writes the snapshot atomically: a temp file in the target directory is
    /// renamed over `path` once fully written.
    #[instrument(skip_all, fields(generation = self.generation, path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_vec(&BodyRef {
            corpus: &self.corpus,
            lexical: self.lexical.to_data(),
            vector: self.vector.to_data(),
        })?;
        let header = SnapshotHeader {
            format: SNAPSHOT_FORMAT.to_string(),
            schema_version: SCHEMA_VERSION,
            min_compatible_version: MIN_COMPATIBLE_VERSION,
            created_at: Utc::now(),
            built_at: self.built_at,
            generation: self.generation,
            chunk_count: self.corpus.len(),
            dim: self.vector.dim(),
            tokenizer_id: self.lexical.tokenizer_id().to_string(),
            checksum: blake3::hash(&body).to_hex().to_string(),
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, &header)?;
        tmp.write_all(b"\n")?;
        tmp.write_all(&body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        info!(chunks = header.chunk_count, bytes = body.len(), "snapshot saved");
        Ok(())
    }

    /// Reads the header of a saved snapshot without touching the body.
    /// Files of a foreign format or incompatible schema are `SnapshotVersion`.
    pub fn read_header(path: &Path) -> Result<SnapshotHeader> {
        let bytes = fs::read(path)?;
        let (header, _) = split_header(&bytes)?;
        Ok(header)
    }

    /// Loads a snapshot saved by [`IndexSnapshot::save`]. `tokenizer` must be
    /// the one the snapshot was built with. Checks run in order: format and
    /// schema version, checksum, tokenizer, structural consistency.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        let bytes = fs::read(path)?;
        let (header, body) = split_header(&bytes)?;

        if blake3::hash(body).to_hex().as_str() != header.checksum {
            return Err(Error::CorruptSnapshot("checksum mismatch".into()));
        }
        if header.tokenizer_id != tokenizer.id() {
            return Err(Error::config(format!(
                "snapshot was built with tokenizer {:?}, got {:?}",
                header.tokenizer_id,
                tokenizer.id()
            )));
        }

        let body: Body = serde_json::from_slice(body)
            .map_err(|e| Error::CorruptSnapshot(format!("unreadable body: {e}")))?;
        let corpus = CorpusSnapshot::from_chunks(body.corpus.into_chunks())?;
        let lexical = LexicalIndex::from_data(body.lexical, tokenizer)?;
        let vector = FlatIndex::from_data(body.vector, corpus.len())?;
        if lexical.chunk_count() != corpus.len() || header.chunk_count != corpus.len() || header.dim != vector.dim() {
            return Err(Error::CorruptSnapshot("header does not match the stored indexes".into()));
        }

        info!(generation = header.generation, chunks = corpus.len(), "snapshot loaded");
        Ok(Self { generation: header.generation, built_at: header.built_at, corpus, lexical, vector })
    }
}

/// Splits off the header line. Format and version are checked before the
/// full header is parsed, so a newer header layout is still a version error.
fn split_header(bytes: &[u8]) -> Result<(SnapshotHeader, &[u8])> {
    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| Error::CorruptSnapshot("missing snapshot header".into()))?;
    let line = &bytes[..newline];

    let version: HeaderVersion = serde_json::from_slice(line)
        .map_err(|e| Error::CorruptSnapshot(format!("unreadable header: {e}")))?;
    if version.format != SNAPSHOT_FORMAT {
        warn!(format = %version.format, "not a snapshot of this format");
        return Err(Error::SnapshotVersion { found: version.schema_version, supported: SCHEMA_VERSION });
    }
    if !compatible(version.schema_version, version.min_compatible_version) {
        return Err(Error::SnapshotVersion { found: version.schema_version, supported: SCHEMA_VERSION });
    }

    let header = serde_json::from_slice(line)
        .map_err(|e| Error::CorruptSnapshot(format!("unreadable header: {e}")))?;
    Ok((header, &bytes[newline + 1..]))
}
