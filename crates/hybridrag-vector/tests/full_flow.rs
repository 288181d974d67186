use anyhow::Result;
use hybridrag_core::corpus::{CorpusSnapshot, InvalidChunkPolicy};
use hybridrag_core::traits::{Embedder, VectorSearch};
use hybridrag_core::types::ChunkInput;
use hybridrag_embed::HashEmbedder;
use hybridrag_vector::FlatIndex;

const TEXTS: [&str; 5] = [
    "Machine learning is a subset of artificial intelligence.",
    "Deep learning uses neural networks with multiple layers.",
    "Natural language processing deals with text and speech.",
    "Computer vision enables machines to interpret images.",
    "Reinforcement learning learns through trial and error.",
];

#[test]
fn flat_index_full_flow() -> Result<()> {
    let inputs = TEXTS.iter().enumerate().map(|(i, t)| ChunkInput::new(*t, "doc1.pdf", i as u32)).collect();
    let corpus = CorpusSnapshot::admit(inputs, InvalidChunkPolicy::Abort)?.corpus;
    let embedder = HashEmbedder::new(128)?;
    let texts: Vec<String> = corpus.iter().map(|c| c.text.clone()).collect();
    let index = FlatIndex::build(&corpus, embedder.embed_batch(&texts)?)?;
    assert_eq!(index.len(), 5);

    // A chunk's own text is its nearest neighbour.
    let query = embedder.embed_batch(&[TEXTS[2].to_string()])?.remove(0);
    let hits = index.search(&query, 3)?;
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].chunk_id.0, 2);
    assert!((hits[0].score - 1.0).abs() < 1e-4);
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    let searcher: &dyn VectorSearch = &index;
    assert_eq!(searcher.dim(), 128);
    assert_eq!(searcher.search_vec(&query, 3)?, hits);
    Ok(())
}
