//! hybridrag-text
//!
//! BM25 lexical index over a corpus snapshot, plus the tokenizers it can be
//! built with.

pub mod index;
pub mod tokenizer;

pub use index::{LexicalIndex, LexicalIndexData, Posting};
pub use tokenizer::{StopwordLowercase, WhitespaceLowercase};
