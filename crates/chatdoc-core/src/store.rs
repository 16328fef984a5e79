//! In-memory vector store for chunk embeddings. Supports similarity search with a score cutoff.
//! No persistence; the store lives as long as the session that built it.
use crate::chunks::Chunk;

/// A chunk with its embedding, stored for similarity search.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    /// Normalized embedding vector (unit length for cosine similarity via dot product).
    embedding: Vec<f32>,
}

/// A retrieved chunk and its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Similarity search over stored chunk embeddings.
pub trait VectorIndex: Send + Sync {
    /// Returns up to `k` chunks scoring at least `score_threshold`, best first.
    /// An empty result is not an error.
    fn search(&self, query_embedding: &[f32], k: usize, score_threshold: f32) -> Vec<ScoredChunk>;

    /// Number of indexed chunks.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension of the stored embeddings, if any are stored.
    fn dimensions(&self) -> Option<usize>;
}

/// Flat in-memory vector store: exhaustive scan, exact cosine scores.
#[derive(Debug, Default)]
pub struct VectorStore {
    items: Vec<IndexedChunk>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add a chunk with its embedding. Embedding is normalized before storage.
    pub(crate) fn add(&mut self, chunk: Chunk, embedding: Vec<f32>) {
        let norm = normalize(&embedding);
        self.items.push(IndexedChunk {
            chunk,
            embedding: norm,
        });
    }
}

impl VectorIndex for VectorStore {
    fn search(&self, query_embedding: &[f32], k: usize, score_threshold: f32) -> Vec<ScoredChunk> {
        if self.items.is_empty() || query_embedding.is_empty() || k == 0 {
            return Vec::new();
        }
        if let Some(dim) = self.dimensions() {
            if dim != query_embedding.len() {
                tracing::debug!(
                    index = dim,
                    query = query_embedding.len(),
                    "query embedding dimension differs from index"
                );
            }
        }
        let q_norm = normalize(query_embedding);
        let mut scored: Vec<ScoredChunk> = self
            .items
            .iter()
            .filter_map(|ic| {
                let score = dot(&q_norm, &ic.embedding);
                (score >= score_threshold).then(|| ScoredChunk {
                    chunk: ic.chunk.clone(),
                    score,
                })
            })
            .collect();
        // Stable sort: ties keep insertion (document) order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn dimensions(&self) -> Option<usize> {
        self.items.first().map(|ic| ic.embedding.len())
    }
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    (0..n).map(|i| a[i] * b[i]).sum()
}
