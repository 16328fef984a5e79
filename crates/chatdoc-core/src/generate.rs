//! The generation capability: prompt in, answer text out.

use async_trait::async_trait;

/// Invokes a language model. May be slow and may fail; callers get no retries.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Output parser stage: the model's completion as plain text, surrounding whitespace removed.
pub fn parse_answer(raw: &str) -> String {
    raw.trim().to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("generation backend failed: {0}")]
    Backend(String),
}
