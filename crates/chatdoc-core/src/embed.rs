//! The embedding capability: text in, fixed-dimension vector out.

use async_trait::async_trait;

/// Maps text to an embedding. The same embedder must serve both the indexed
/// chunks and the queries of one session.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Embed multiple strings, one vector per input. Sequential by default;
    /// backends with native batching override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding backend failed: {0}")]
    Backend(String),
    #[error("embedding backend returned no vector")]
    Empty,
}
