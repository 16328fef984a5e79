//! Index build: chunks → embeddings → vector store. Always builds a fresh store.

use crate::chunks::Chunk;
use crate::embed::{EmbedError, Embedder};
use crate::store::VectorStore;

/// Embeds every chunk and returns a new populated vector store.
/// Nothing is returned unless every chunk was embedded consistently.
pub async fn build_index(chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<VectorStore, IndexError> {
    if chunks.is_empty() {
        return Err(IndexError::Empty);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;
    if embeddings.len() != chunks.len() {
        return Err(IndexError::CountMismatch {
            chunks: chunks.len(),
            embeddings: embeddings.len(),
        });
    }

    let dimensions = embeddings[0].len();
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
        return Err(IndexError::DimensionMismatch {
            expected: dimensions,
            found: bad.len(),
        });
    }

    let mut store = VectorStore::new();
    for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
        store.add(chunk, embedding);
    }
    tracing::debug!(chunks = texts.len(), dimensions, "built vector index");
    Ok(store)
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("nothing to index")]
    Empty,
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),
    #[error("embedder returned {embeddings} vectors for {chunks} chunks")]
    CountMismatch { chunks: usize, embeddings: usize },
    #[error("embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}
