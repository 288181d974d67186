#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod params;
pub mod traits;
pub mod types;

pub use corpus::{Admitted, CorpusSnapshot, InvalidChunkPolicy};
pub use error::{Error, Result};
pub use types::{Chunk, ChunkId, ChunkInput, ExtractedAnswer, FusedHit, HitSource, RankedHit, RerankedHit};
pub use params::{Bm25Params, FusionStrategy, QueryParams};
