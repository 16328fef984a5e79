//! Retriever: the vector store behind a fixed top-K / score-cutoff policy.

use std::sync::Arc;

use crate::chunks::Chunk;
use crate::embed::{EmbedError, Embedder};
use crate::store::{ScoredChunk, VectorIndex};

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

/// How many chunks to return and how relevant they must be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalPolicy {
    pub top_k: usize,
    pub score_threshold: f32,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

/// Bound to one document's index and the embedder that built it.
pub struct Retriever {
    index: Box<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    policy: RetrievalPolicy,
}

impl Retriever {
    pub fn new(index: Box<dyn VectorIndex>, embedder: Arc<dyn Embedder>, policy: RetrievalPolicy) -> Self {
        Self {
            index,
            embedder,
            policy,
        }
    }

    /// Embeds the query and returns the qualifying chunks with their scores, best first.
    pub async fn retrieve_scored(&self, query: &str) -> Result<Vec<ScoredChunk>, EmbedError> {
        let query_embedding = self.embedder.embed(query).await?;
        let results = self
            .index
            .search(&query_embedding, self.policy.top_k, self.policy.score_threshold);
        for r in &results {
            tracing::debug!(chunk = r.chunk.index, score = r.score, "retrieved chunk");
        }
        Ok(results)
    }

    /// Like [`Retriever::retrieve_scored`] with the scores dropped.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>, EmbedError> {
        Ok(self
            .retrieve_scored(query)
            .await?
            .into_iter()
            .map(|r| r.chunk)
            .collect())
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("chunks", &self.index.len())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::TextSplitter;
    use crate::document::Segment;
    use crate::index::build_index;
    use crate::mock::{FailingEmbedder, KeywordEmbedder};

    async fn retriever(texts: &[&str], policy: RetrievalPolicy) -> Retriever {
        let embedder: Arc<dyn Embedder> =
            Arc::new(KeywordEmbedder::new(&["sky", "blue", "grass", "green"]));
        let segments: Vec<Segment> = texts.iter().map(|t| Segment::new(*t)).collect();
        let chunks = TextSplitter::default().split(&segments).chunks;
        let store = build_index(chunks, embedder.as_ref()).await.unwrap();
        Retriever::new(Box::new(store), embedder, policy)
    }

    #[tokio::test]
    async fn returns_relevant_chunk_above_threshold() {
        let r = retriever(&["The sky is blue.", "The grass is green."], RetrievalPolicy::default()).await;
        let res = r.retrieve_scored("What color is the sky?").await.unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].chunk.text, "The sky is blue.");
        assert!(res[0].score >= 0.5);
    }

    #[tokio::test]
    async fn unrelated_query_yields_empty() {
        let r = retriever(&["The sky is blue."], RetrievalPolicy::default()).await;
        assert!(r.retrieve("Where is the grass?").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn policy_caps_results() {
        let policy = RetrievalPolicy {
            top_k: 2,
            score_threshold: 0.0,
        };
        let r = retriever(&["sky one", "sky two", "sky three"], policy).await;
        let res = r.retrieve("sky").await.unwrap();
        assert_eq!(res.len(), 2);
    }

    #[tokio::test]
    async fn same_query_same_result() {
        let r = retriever(&["The sky is blue.", "Blue sky again."], RetrievalPolicy::default()).await;
        let a = r.retrieve_scored("blue sky").await.unwrap();
        let b = r.retrieve_scored("blue sky").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn query_embedding_failure_propagates() {
        let good = retriever(&["The sky is blue."], RetrievalPolicy::default()).await;
        let r = Retriever::new(good.index, Arc::new(FailingEmbedder), RetrievalPolicy::default());
        assert!(r.retrieve("sky").await.is_err());
    }
}
