//! Loading a single document from disk into ordered text segments.
//!
//! PDFs yield one segment per page. Markdown files may carry YAML frontmatter,
//! which becomes the segment's metadata. Anything else is read as UTF-8 text.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Files larger than this are rejected before reading: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Raw metadata attached to a segment. May be nested until the chunker flattens it.
pub type Metadata = Map<String, Value>;

/// A raw text unit produced by a loader (e.g. one PDF page), in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub metadata: Metadata,
}

impl Segment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Extracts ordered text segments from a source file.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Vec<Segment>, LoadError>;
}

/// Loads PDF, markdown and plain-text files by extension.
#[derive(Debug, Clone)]
pub struct FileLoader {
    pub max_file_size: u64,
}

impl Default for FileLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[async_trait]
impl DocumentLoader for FileLoader {
    async fn load(&self, path: &Path) -> Result<Vec<Segment>, LoadError> {
        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound(path.to_path_buf())
            } else {
                LoadError::Read(path.to_path_buf(), e)
            }
        })?;
        if !meta.is_file() {
            return Err(LoadError::NotAFile(path.to_path_buf()));
        }
        if meta.len() > self.max_file_size {
            return Err(LoadError::TooLarge(path.to_path_buf(), meta.len()));
        }

        let source = path.display().to_string();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let segments = match ext.as_str() {
            "pdf" => load_pdf(path).await?,
            "md" | "markdown" => {
                let raw = read_text(path).await?;
                let (frontmatter, body) = split_frontmatter(&raw, path)?;
                let mut segment = Segment::new(body).with_meta("page", 0);
                segment.metadata.extend(frontmatter);
                vec![segment]
            }
            _ => vec![Segment::new(read_text(path).await?).with_meta("page", 0)],
        };

        Ok(segments
            .into_iter()
            .map(|s| s.with_meta("source", source.clone()))
            .collect())
    }
}

async fn read_text(path: &Path) -> Result<String, LoadError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LoadError::Read(path.to_path_buf(), e))
}

/// Extracts text page by page. pdf-extract is synchronous and CPU-bound.
async fn load_pdf(path: &Path) -> Result<Vec<Segment>, LoadError> {
    let owned = path.to_path_buf();
    let pages = tokio::task::spawn_blocking(move || pdf_extract::extract_text_by_pages(&owned))
        .await
        .map_err(|e| LoadError::Pdf(path.to_path_buf(), e.to_string()))?
        .map_err(|e| LoadError::Pdf(path.to_path_buf(), e.to_string()))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(page, text)| Segment::new(text).with_meta("page", page))
        .collect())
}

/// Splits optional YAML frontmatter (between a leading `---` and the next `---` line)
/// from the markdown body. Returns empty metadata and the whole content when the
/// block is not a YAML mapping.
fn split_frontmatter(content: &str, path: &Path) -> Result<(Metadata, String), LoadError> {
    let s = content.trim_start();
    let Some(after_first) = s.strip_prefix("---") else {
        return Ok((Metadata::new(), content.to_string()));
    };
    let Some(end) = after_first.find("\n---") else {
        return Ok((Metadata::new(), content.to_string()));
    };
    let yaml = &after_first[..end];
    let body = after_first[end + 4..].trim_start().to_string();
    if yaml.trim().is_empty() {
        return Ok((Metadata::new(), body));
    }
    // Only a YAML mapping is frontmatter; anything else is a `---` rule in the body.
    let value = match serde_yaml::from_str::<serde_yaml::Value>(yaml) {
        Ok(value @ serde_yaml::Value::Mapping(_)) => value,
        _ => return Ok((Metadata::new(), content.to_string())),
    };
    let metadata: Metadata = serde_yaml::from_value(value)
        .map_err(|e| LoadError::Frontmatter(path.to_path_buf(), e.to_string()))?;
    Ok((metadata, body))
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("document not found: {0}")]
    NotFound(PathBuf),
    #[error("not a file: {0}")]
    NotAFile(PathBuf),
    #[error("document {0} is too large ({1} bytes)")]
    TooLarge(PathBuf, u64),
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("could not extract text from PDF {0}: {1}")]
    Pdf(PathBuf, String),
    #[error("invalid frontmatter in {0}: {1}")]
    Frontmatter(PathBuf, String),
}
