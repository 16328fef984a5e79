//! All backend logic independent of how the app is run.
//!
//! A [`Pipeline`] holds at most one document. Its index lives in memory only; ChatDoc
//! stores nothing but its config in the app data directory (see [app_data]).

pub mod app_data;
pub mod chunks;
pub mod config;
pub mod document;
pub mod embed;
pub mod generate;
pub mod index;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ollama;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod store;

pub use app_data::app_data_dir;
pub use chunks::{Chunk, Scalar, SplitOutcome, TextSplitter, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use config::{config_path, load_config, save_config, Config, ConfigError};
pub use document::{DocumentLoader, FileLoader, LoadError, Segment};
pub use embed::{EmbedError, Embedder};
pub use generate::{GenerateError, Generator};
pub use index::{build_index, IndexError};
pub use ollama::{OllamaClient, OllamaError};
pub use pipeline::{AskError, IngestError, IngestReport, Pipeline, PipelineError, SessionState, NOT_READY_MESSAGE};
pub use prompt::{PromptTemplate, TemplateError, DEFAULT_TEMPLATE};
pub use retriever::{RetrievalPolicy, Retriever};
pub use store::{ScoredChunk, VectorIndex, VectorStore};

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "chatdoc-core ready"
}
