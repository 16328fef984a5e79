//! Ollama client for embeddings and chat completion. Wraps ollama-rs with a simple API.

use async_trait::async_trait;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::Ollama;
use thiserror::Error;

use crate::embed::{EmbedError, Embedder};
use crate::generate::{GenerateError, Generator};

pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_CHAT_MODEL: &str = "mistral";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Thin wrapper around Ollama for embedding and completion.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    inner: Ollama,
    embed_model: String,
    chat_model: String,
}

impl OllamaClient {
    /// Create from URL string, e.g. `http://localhost:11434`.
    pub fn from_url(url: &str) -> Result<Self, OllamaError> {
        let inner = Ollama::try_new(url).map_err(OllamaError::ParseUrl)?;
        Ok(Self {
            inner,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
        })
    }

    /// Set the embedding model (e.g. `nomic-embed-text`, `all-minilm`).
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    /// Set the chat model used for answers (e.g. `mistral`, `llama3.2`).
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    async fn embed_input(&self, input: EmbeddingsInput) -> Result<Vec<Vec<f32>>, OllamaError> {
        let req = GenerateEmbeddingsRequest::new(self.embed_model.clone(), input);
        let res = self
            .inner
            .generate_embeddings(req)
            .await
            .map_err(OllamaError::Request)?;
        Ok(res.embeddings)
    }

    /// Send the prompt as a single user message and return the reply text.
    pub async fn chat(&self, prompt: &str) -> Result<String, OllamaError> {
        let req = ChatMessageRequest::new(
            self.chat_model.clone(),
            vec![ChatMessage::user(prompt.to_string())],
        );
        let res = self
            .inner
            .send_chat_messages(req)
            .await
            .map_err(OllamaError::Request)?;
        Ok(res.message.content)
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed_input(EmbeddingsInput::Single(text.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or(EmbedError::Empty)
    }

    /// One request for all texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .embed_input(EmbeddingsInput::Multiple(texts.to_vec()))
            .await?)
    }
}

#[async_trait]
impl Generator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        tracing::debug!(model = %self.chat_model, prompt_chars = prompt.len(), "sending prompt to Ollama");
        self.chat(prompt)
            .await
            .map_err(|e| GenerateError::Backend(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("invalid Ollama URL: {0}")]
    ParseUrl(#[from] url::ParseError),
    #[error("Ollama request failed: {0}")]
    Request(#[from] ollama_rs::error::OllamaError),
}

impl From<OllamaError> for EmbedError {
    fn from(e: OllamaError) -> Self {
        EmbedError::Backend(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            OllamaClient::from_url("not a url"),
            Err(OllamaError::ParseUrl(_))
        ));
    }

    #[test]
    fn builder_sets_models() {
        let c = OllamaClient::from_url(DEFAULT_BASE_URL)
            .unwrap()
            .with_embed_model("all-minilm")
            .with_chat_model("llama3.2");
        assert_eq!(c.embed_model(), "all-minilm");
        assert_eq!(c.chat_model(), "llama3.2");
    }

    #[tokio::test]
    async fn unreachable_endpoint_errors() {
        let c = OllamaClient::from_url("http://127.0.0.1:1").unwrap();
        assert!(c.embed("hello").await.is_err());
        assert!(c.generate("hello").await.is_err());
    }

    #[tokio::test]
    async fn empty_batch_skips_the_request() {
        let c = OllamaClient::from_url("http://127.0.0.1:1").unwrap();
        assert!(c.embed_batch(&[]).await.unwrap().is_empty());
    }
}
