use std::sync::Arc;

use hybridrag_core::traits::LexicalSearch;
use hybridrag_core::{Bm25Params, ChunkId, ChunkInput, CorpusSnapshot, Error, InvalidChunkPolicy};
use hybridrag_text::{LexicalIndex, WhitespaceLowercase};

fn sample_corpus() -> CorpusSnapshot {
    let texts = [
        "Machine learning is a subset of artificial intelligence.",
        "Deep learning uses neural networks with multiple layers.",
        "Natural language processing deals with text and speech.",
        "Computer vision enables machines to interpret images.",
        "Reinforcement learning learns through trial and error.",
    ];
    let inputs = texts.iter().enumerate().map(|(i, t)| ChunkInput::new(*t, "doc1.pdf", i as u32)).collect();
    CorpusSnapshot::admit(inputs, InvalidChunkPolicy::Abort).expect("corpus").corpus
}

#[test]
fn machine_learning_sentence_ranks_first() {
    let index = LexicalIndex::build(&sample_corpus(), Bm25Params::default(), Arc::new(WhitespaceLowercase)).expect("index");
    let hits = index.search("machine learning", 3);
    eprintln!("q='machine learning' -> {hits:?}");
    assert!(!hits.is_empty() && hits.len() <= 3);
    assert_eq!(hits[0].chunk_id, ChunkId(0));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    if hits.len() >= 2 { assert!((hits[0].score - hits[1].score).abs() > 1e-6); }
}

#[test]
fn repeated_queries_through_trait_object_are_identical() {
    let index = LexicalIndex::build(&sample_corpus(), Bm25Params::default(), Arc::new(WhitespaceLowercase)).expect("index");
    let search: &dyn LexicalSearch = &index;
    let first = search.search("learning networks images", 4);
    for _ in 0..10 { assert_eq!(search.search("learning networks images", 4), first); }
}

#[test]
fn empty_corpus_is_rejected() {
    let err = CorpusSnapshot::admit(Vec::new(), InvalidChunkPolicy::Abort).expect_err("empty");
    assert!(matches!(err, Error::EmptyCorpus));
}
