//! Dense-vector retrieval over a corpus snapshot.

pub mod flat;

pub use flat::{FlatIndex, FlatIndexData};
