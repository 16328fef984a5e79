//! Persisted config (Ollama endpoint, models, chunking and retrieval knobs) in the app data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::chunks::{ChunkError, TextSplitter, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::ollama::{DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_EMBED_MODEL};
use crate::prompt::{PromptTemplate, TemplateError};
use crate::retriever::{RetrievalPolicy, DEFAULT_SCORE_THRESHOLD, DEFAULT_TOP_K};

const CONFIG_FILENAME: &str = "config.toml";

/// Missing keys fall back to their defaults, so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ollama_url: String,
    /// Model that writes the answers.
    pub chat_model: String,
    /// Model used for both chunk and query embeddings.
    pub embed_model: String,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks. Must be less than `chunk_size`.
    pub chunk_overlap: usize,
    /// Chunks handed to the model per question.
    pub top_k: usize,
    /// Minimum cosine similarity for a chunk to count as relevant.
    pub score_threshold: f32,
    /// Custom prompt; must contain `{question}` and `{context}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            prompt_template: None,
        }
    }
}

impl Config {
    /// Checks that every knob is usable before a pipeline is built from it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.splitter()?;
        self.template()?;
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be greater than zero".into()));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(ConfigError::Invalid(format!(
                "score_threshold ({}) must be between 0 and 1",
                self.score_threshold
            )));
        }
        Ok(())
    }

    pub fn splitter(&self) -> Result<TextSplitter, ConfigError> {
        Ok(TextSplitter::new(self.chunk_size, self.chunk_overlap)?)
    }

    pub fn policy(&self) -> RetrievalPolicy {
        RetrievalPolicy {
            top_k: self.top_k,
            score_threshold: self.score_threshold,
        }
    }

    pub fn template(&self) -> Result<PromptTemplate, ConfigError> {
        match &self.prompt_template {
            Some(t) => Ok(PromptTemplate::new(t.clone())?),
            None => Ok(PromptTemplate::default()),
        }
    }
}

/// Path of the config file in the app data directory.
pub fn config_path() -> Option<PathBuf> {
    app_data::app_data_dir().map(|d| d.join(CONFIG_FILENAME))
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> Config {
    config_path()
        .map(|p| load_config_from(&p))
        .unwrap_or_default()
}

/// Load config from `path`. Returns default config if missing or invalid.
pub fn load_config_from(path: &Path) -> Config {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    match toml::from_str(&s) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
            Config::default()
        }
    }
}

/// Save config to the app data directory.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoDataDir)?;
    save_config_to(config, &path)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, s).map_err(ConfigError::Write)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("invalid chunking settings: {0}")]
    Chunking(#[from] ChunkError),
    #[error("invalid prompt template: {0}")]
    Template(#[from] TemplateError),
    #[error("invalid config: {0}")]
    Invalid(String),
}
