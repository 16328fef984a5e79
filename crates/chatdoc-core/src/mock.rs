//! Deterministic stand-ins for the loader, embedder and generator.
//! No model or network involved; used by tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::document::{DocumentLoader, LoadError, Segment};
use crate::embed::{EmbedError, Embedder};
use crate::generate::{GenerateError, Generator};

/// Bag-of-words embedder over a fixed vocabulary: dimension `i` counts
/// occurrences of vocabulary word `i` (case-insensitive, whole words).
#[derive(Debug, Clone)]
pub struct KeywordEmbedder {
    vocab: Vec<String>,
}

impl KeywordEmbedder {
    pub fn new(vocab: &[&str]) -> Self {
        Self {
            vocab: vocab.iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        self.vocab
            .iter()
            .map(|v| words.iter().filter(|w| **w == v.as_str()).count() as f32)
            .collect()
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.vector(text))
    }
}

/// Always fails, as an unreachable embedding backend would.
#[derive(Debug, Clone, Default)]
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        Err(EmbedError::Backend("mock embedder unavailable".into()))
    }
}

/// A [`KeywordEmbedder`] whose backend can go down mid-session.
/// Clones share the switch.
#[derive(Debug, Clone)]
pub struct SwitchableEmbedder {
    inner: KeywordEmbedder,
    down: Arc<AtomicBool>,
}

impl SwitchableEmbedder {
    pub fn new(inner: KeywordEmbedder) -> Self {
        Self {
            inner,
            down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl Embedder for SwitchableEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(EmbedError::Backend("mock embedder went down".into()));
        }
        self.inner.embed(text).await
    }
}

/// Records every prompt it receives and answers with a fixed reply,
/// or fails when `fail` is set.
#[derive(Debug, Clone)]
pub struct MockGenerator {
    prompts: Arc<Mutex<Vec<String>>>,
    pub reply: String,
    pub fail: bool,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self {
            prompts: Arc::new(Mutex::new(Vec::new())),
            reply: "mock answer".into(),
            fail: false,
        }
    }
}

impl MockGenerator {
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }
        if self.fail {
            return Err(GenerateError::Backend("mock generator failed".into()));
        }
        Ok(self.reply.clone())
    }
}

/// Serves documents from memory, keyed by path. Unknown paths are not found.
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    docs: HashMap<PathBuf, Vec<Segment>>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, path: impl Into<PathBuf>, segments: Vec<Segment>) -> Self {
        self.docs.insert(path.into(), segments);
        self
    }

    /// One single-segment document per `(path, text)` pair.
    pub fn with_text(self, path: impl Into<PathBuf>, text: &str) -> Self {
        self.with_document(path, vec![Segment::new(text).with_meta("page", 0)])
    }
}

#[async_trait]
impl DocumentLoader for StaticLoader {
    async fn load(&self, path: &Path) -> Result<Vec<Segment>, LoadError> {
        self.docs
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_vector_counts_whole_words() {
        let e = KeywordEmbedder::new(&["sky", "blue"]);
        assert_eq!(e.vector("The SKY is blue, blue!"), vec![1.0, 2.0]);
        assert_eq!(e.vector("skyline"), vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn switchable_embedder_follows_its_clones() {
        let e = SwitchableEmbedder::new(KeywordEmbedder::new(&["sky"]));
        let handle = e.clone();
        assert_eq!(e.embed("sky").await.unwrap(), vec![1.0]);
        handle.set_down(true);
        assert!(e.embed("sky").await.is_err());
        handle.set_down(false);
        assert!(e.embed("sky").await.is_ok());
    }

    #[tokio::test]
    async fn generator_records_prompts() {
        let g = MockGenerator::with_reply("ok");
        assert_eq!(g.generate("p1").await.unwrap(), "ok");
        assert_eq!(g.prompts(), vec!["p1".to_string()]);
        assert!(MockGenerator::failing().generate("p").await.is_err());
    }
}
