//! Question answering over one document: load → chunk → embed → index on ingest,
//! retrieve → compose → generate → parse on ask.
//!
//! A pipeline is either empty or ready with exactly one document. Ingest builds the
//! whole session off to the side and only swaps it in once every step succeeded, so a
//! failed ingest leaves the previous state in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::chunks::TextSplitter;
use crate::config::{Config, ConfigError};
use crate::document::{DocumentLoader, FileLoader, LoadError};
use crate::embed::{EmbedError, Embedder};
use crate::generate::{parse_answer, GenerateError, Generator};
use crate::index::{build_index, IndexError};
use crate::ollama::{OllamaClient, OllamaError};
use crate::prompt::PromptTemplate;
use crate::retriever::{RetrievalPolicy, Retriever};
use crate::store::VectorIndex;

/// Returned verbatim by [`Pipeline::ask`] while no document is loaded.
pub const NOT_READY_MESSAGE: &str = "Please add a document first.";

/// What one successful ingest produced.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub source: PathBuf,
    /// Raw segments from the loader (e.g. PDF pages).
    pub segments: usize,
    /// Chunks embedded into the index.
    pub chunks: usize,
    /// Chunks excluded because their metadata could not be flattened.
    pub dropped_chunks: usize,
    pub dimensions: usize,
}

/// Prompt → model → parsed answer, fed by the session's retriever.
pub struct Chain {
    template: PromptTemplate,
    generator: Arc<dyn Generator>,
}

impl Chain {
    pub fn new(template: PromptTemplate, generator: Arc<dyn Generator>) -> Self {
        Self { template, generator }
    }

    /// Runs retrieve → compose → generate → parse. Each stage's failure surfaces as-is.
    pub async fn invoke(&self, retriever: &Retriever, question: &str) -> Result<String, AskError> {
        let context = retriever.retrieve(question).await?;
        if context.is_empty() {
            warn!("no chunk met the score threshold; answering with empty context");
        }
        info!(retrieved = context.len(), "retrieved context");
        let prompt = self.template.compose(question, &context);
        let raw = self.generator.generate(&prompt).await?;
        Ok(parse_answer(&raw))
    }
}

/// The live document: its index (inside the retriever) and the chain that answers from it.
pub struct Session {
    pub report: IngestReport,
    pub retriever: Retriever,
    pub chain: Chain,
}

pub enum SessionState {
    Empty,
    Ready(Session),
}

pub struct Pipeline {
    loader: Arc<dyn DocumentLoader>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    splitter: TextSplitter,
    policy: RetrievalPolicy,
    template: PromptTemplate,
    state: SessionState,
}

impl Pipeline {
    /// Builds an empty pipeline with default chunking, retrieval and prompt settings.
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            loader,
            embedder,
            generator,
            splitter: TextSplitter::default(),
            policy: RetrievalPolicy::default(),
            template: PromptTemplate::default(),
            state: SessionState::Empty,
        }
    }

    /// Production wiring: file loader plus one Ollama client for embeddings and answers.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        config.validate()?;
        let client = Arc::new(
            OllamaClient::from_url(&config.ollama_url)?
                .with_embed_model(&config.embed_model)
                .with_chat_model(&config.chat_model),
        );
        Self::new(Arc::new(FileLoader::default()), client.clone(), client)
            .with_config(config)
            .map_err(Into::into)
    }

    /// Applies chunking, retrieval and prompt settings. Takes effect on the next ingest.
    pub fn with_config(mut self, config: &Config) -> Result<Self, ConfigError> {
        self.splitter = config.splitter()?;
        self.policy = config.policy();
        self.template = config.template()?;
        Ok(self)
    }

    pub fn with_splitter(mut self, splitter: TextSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_policy(mut self, policy: RetrievalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready(_))
    }

    /// Report of the live document, if any.
    pub fn report(&self) -> Option<&IngestReport> {
        match &self.state {
            SessionState::Ready(s) => Some(&s.report),
            SessionState::Empty => None,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.report().map(|r| r.source.as_path())
    }

    /// Replaces the current document with the one at `path`.
    /// On error the pipeline keeps whatever state it had before.
    pub async fn ingest(&mut self, path: &Path) -> Result<IngestReport, IngestError> {
        info!(path = %path.display(), "ingesting document");
        let segments = self.loader.load(path).await?;
        let outcome = self.splitter.split(&segments);
        if outcome.chunks.is_empty() {
            return Err(IngestError::EmptyDocument(path.to_path_buf()));
        }
        let chunks = outcome.chunks.len();

        let store = build_index(outcome.chunks, self.embedder.as_ref()).await?;
        let report = IngestReport {
            source: path.to_path_buf(),
            segments: segments.len(),
            chunks,
            dropped_chunks: outcome.dropped,
            dimensions: store.dimensions().unwrap_or_default(),
        };
        let retriever = Retriever::new(Box::new(store), self.embedder.clone(), self.policy);
        let chain = Chain::new(self.template.clone(), self.generator.clone());

        self.state = SessionState::Ready(Session {
            report: report.clone(),
            retriever,
            chain,
        });
        info!(
            segments = report.segments,
            chunks = report.chunks,
            dropped = report.dropped_chunks,
            dimensions = report.dimensions,
            "document ready"
        );
        Ok(report)
    }

    /// Answers from the live document, or returns [`NOT_READY_MESSAGE`] when there is none.
    /// Never changes the session; after an error the same document is still loaded.
    pub async fn ask(&self, query: &str) -> Result<String, AskError> {
        match &self.state {
            SessionState::Empty => Ok(NOT_READY_MESSAGE.to_string()),
            SessionState::Ready(session) => session.chain.invoke(&session.retriever, query).await,
        }
    }

    /// Drops the document, index, retriever and chain. Idempotent.
    pub fn clear(&mut self) {
        if self.is_ready() {
            info!("clearing session");
        }
        self.state = SessionState::Empty;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("could not load document: {0}")]
    Load(#[from] LoadError),
    #[error("no text to index in {0}")]
    EmptyDocument(PathBuf),
    #[error("could not build index: {0}")]
    Index(#[from] IndexError),
}

#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("could not embed question: {0}")]
    Embedding(#[from] EmbedError),
    #[error("could not generate answer: {0}")]
    Generation(#[from] GenerateError),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ollama(#[from] OllamaError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Segment;
    use crate::mock::{FailingEmbedder, KeywordEmbedder, MockGenerator, StaticLoader, SwitchableEmbedder};

    const SKY: &str = "sky.txt";
    const GRASS: &str = "grass.txt";

    fn loader() -> StaticLoader {
        StaticLoader::new()
            .with_text(SKY, "The sky is blue.")
            .with_text(GRASS, "The grass is green.")
            .with_text("blank.txt", "  \n\n ")
    }

    fn embedder() -> Arc<KeywordEmbedder> {
        Arc::new(KeywordEmbedder::new(&["sky", "blue", "grass", "green"]))
    }

    fn pipeline(generator: &MockGenerator) -> Pipeline {
        Pipeline::new(Arc::new(loader()), embedder(), Arc::new(generator.clone()))
    }

    #[tokio::test]
    async fn ask_before_ingest_returns_advisory() {
        let g = MockGenerator::default();
        let p = pipeline(&g);
        for q in ["", "What color is the sky?"] {
            assert_eq!(p.ask(q).await.unwrap(), NOT_READY_MESSAGE);
        }
        assert!(g.prompts().is_empty());
        assert!(!p.is_ready());
    }

    #[tokio::test]
    async fn sky_scenario_reaches_generator_with_context() {
        let g = MockGenerator::with_reply("  The sky is blue.\n");
        let mut p = pipeline(&g);
        let report = p.ingest(Path::new(SKY)).await.unwrap();
        assert_eq!(report.chunks, 1);
        assert_eq!(report.dimensions, 4);
        assert_eq!(p.source(), Some(Path::new(SKY)));

        let answer = p.ask("What color is the sky?").await.unwrap();
        assert_eq!(answer, "The sky is blue.");
        let prompts = g.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("What color is the sky?"));
        assert!(prompts[0].contains("Context: The sky is blue."));
    }

    #[tokio::test]
    async fn unrelated_question_sends_empty_context() {
        let g = MockGenerator::default();
        let mut p = pipeline(&g);
        p.ingest(Path::new(SKY)).await.unwrap();
        p.ask("Where is the grass?").await.unwrap();
        let prompts = g.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Context: \nAnswer:"));
    }

    #[tokio::test]
    async fn clear_returns_to_fresh_state_and_is_idempotent() {
        let g = MockGenerator::default();
        let mut p = pipeline(&g);
        p.ingest(Path::new(SKY)).await.unwrap();
        assert!(p.is_ready());
        p.clear();
        assert!(!p.is_ready());
        assert!(p.report().is_none());
        assert_eq!(p.ask("sky").await.unwrap(), NOT_READY_MESSAGE);
        p.clear();
        assert!(matches!(p.state(), SessionState::Empty));
        assert_eq!(p.ask("").await.unwrap(), NOT_READY_MESSAGE);
    }

    #[tokio::test]
    async fn reingest_replaces_the_document() {
        let g = MockGenerator::default();
        let mut p = pipeline(&g);
        p.ingest(Path::new(SKY)).await.unwrap();
        p.ingest(Path::new(GRASS)).await.unwrap();
        assert_eq!(p.source(), Some(Path::new(GRASS)));
        p.ask("Is the sky blue?").await.unwrap();
        assert!(g.prompts()[0].contains("Context: \nAnswer:"));
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_session() {
        let g = MockGenerator::default();
        let mut p = pipeline(&g);
        p.ingest(Path::new(SKY)).await.unwrap();
        let err = p.ingest(Path::new("missing.pdf")).await.unwrap_err();
        assert!(matches!(err, IngestError::Load(LoadError::NotFound(_))));
        assert_eq!(p.source(), Some(Path::new(SKY)));
        p.ask("sky?").await.unwrap();
        assert!(g.prompts()[0].contains("The sky is blue."));
    }

    #[tokio::test]
    async fn failed_embedding_on_ingest_leaves_empty_pipeline_empty() {
        let g = MockGenerator::default();
        let mut p = Pipeline::new(Arc::new(loader()), Arc::new(FailingEmbedder), Arc::new(g.clone()));
        let err = p.ingest(Path::new(SKY)).await.unwrap_err();
        assert!(matches!(err, IngestError::Index(IndexError::Embedding(_))));
        assert!(!p.is_ready());
        assert_eq!(p.ask("sky").await.unwrap(), NOT_READY_MESSAGE);
    }

    fn switchable_pipeline(generator: &MockGenerator) -> (Pipeline, SwitchableEmbedder) {
        let embedder = SwitchableEmbedder::new(KeywordEmbedder::new(&["sky", "blue", "grass", "green"]));
        let p = Pipeline::new(Arc::new(loader()), Arc::new(embedder.clone()), Arc::new(generator.clone()));
        (p, embedder)
    }

    #[tokio::test]
    async fn failed_query_embedding_keeps_session_ready() {
        let g = MockGenerator::default();
        let (mut p, embedder) = switchable_pipeline(&g);
        p.ingest(Path::new(SKY)).await.unwrap();

        embedder.set_down(true);
        let err = p.ask("What color is the sky?").await.unwrap_err();
        assert!(matches!(err, AskError::Embedding(_)));
        assert!(p.is_ready());
        assert_eq!(p.source(), Some(Path::new(SKY)));
        assert!(g.prompts().is_empty());

        embedder.set_down(false);
        p.ask("What color is the sky?").await.unwrap();
        assert!(g.prompts()[0].contains("Context: The sky is blue."));
    }

    #[tokio::test]
    async fn failed_reingest_embedding_keeps_previous_session() {
        let g = MockGenerator::default();
        let (mut p, embedder) = switchable_pipeline(&g);
        p.ingest(Path::new(SKY)).await.unwrap();

        embedder.set_down(true);
        let err = p.ingest(Path::new(GRASS)).await.unwrap_err();
        assert!(matches!(err, IngestError::Index(IndexError::Embedding(_))));
        assert!(p.is_ready());
        assert_eq!(p.source(), Some(Path::new(SKY)));

        embedder.set_down(false);
        p.ask("Is the sky blue?").await.unwrap();
        assert!(g.prompts()[0].contains("Context: The sky is blue."));
    }

    #[tokio::test]
    async fn blank_document_is_rejected() {
        let g = MockGenerator::default();
        let mut p = pipeline(&g);
        let err = p.ingest(Path::new("blank.txt")).await.unwrap_err();
        assert!(matches!(err, IngestError::EmptyDocument(_)));
        assert!(!p.is_ready());
    }

    #[tokio::test]
    async fn generation_failure_keeps_session_ready() {
        let failing = MockGenerator::failing();
        let mut p = pipeline(&failing);
        p.ingest(Path::new(SKY)).await.unwrap();
        let err = p.ask("sky?").await.unwrap_err();
        assert!(matches!(err, AskError::Generation(_)));
        assert!(p.is_ready());
        assert!(matches!(p.ask("sky?").await, Err(AskError::Generation(_))));
        assert_eq!(failing.prompts().len(), 2);
    }

    #[tokio::test]
    async fn dropped_chunks_are_counted() {
        let mut bad = Segment::new("sky with odd metadata");
        bad.metadata.insert("a.b".into(), 1.into());
        bad.metadata.insert("a".into(), serde_json::json!({ "b": 2 }));
        let loader = StaticLoader::new().with_document(
            "mixed.txt",
            vec![bad, Segment::new("The sky is blue.")],
        );
        let g = MockGenerator::default();
        let mut p = Pipeline::new(Arc::new(loader), embedder(), Arc::new(g));
        let report = p.ingest(Path::new("mixed.txt")).await.unwrap();
        assert_eq!(report.segments, 2);
        assert_eq!(report.chunks, 1);
        assert_eq!(report.dropped_chunks, 1);
    }

    #[tokio::test]
    async fn config_policy_applies_on_ingest() {
        let g = MockGenerator::default();
        let config = Config {
            score_threshold: 0.0,
            top_k: 1,
            prompt_template: Some("[{context}] {question}".into()),
            ..Config::default()
        };
        let mut p = pipeline(&g).with_config(&config).unwrap();
        p.ingest(Path::new(SKY)).await.unwrap();
        p.ask("grass").await.unwrap();
        assert_eq!(g.prompts()[0], "[The sky is blue.] grass");
    }
}
