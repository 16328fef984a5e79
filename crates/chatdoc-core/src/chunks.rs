//! Splits document segments into overlapping chunks for embedding and search.
//! Prefers paragraph boundaries; falls back to lines, sentences, words, then a hard character cut.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::document::{Metadata, Segment};

/// Default maximum characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;
/// Default number of characters shared by consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Separator tiers tried in order, coarsest first. Within a tier the rightmost
/// match wins. A hard cut follows the last tier.
const SEPARATORS: [&[&str]; 4] = [&["\n\n"], &["\n"], &[". ", "? ", "! "], &[" "]];

/// A flattened metadata value. The index only stores scalars.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

/// A chunk of text from a document, with source reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Position of this chunk within the document (0, 1, 2, …).
    pub index: usize,
    pub text: String,
    pub metadata: BTreeMap<String, Scalar>,
    /// Character offset of the chunk's first char within its segment.
    pub start: usize,
    /// Character offset one past the chunk's last char within its segment.
    pub end: usize,
}

/// Result of splitting: accepted chunks plus how many were excluded
/// because their metadata could not be flattened.
#[derive(Debug, Clone, Default)]
pub struct SplitOutcome {
    pub chunks: Vec<Chunk>,
    pub dropped: usize,
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl TextSplitter {
    /// Create a splitter. Requires `chunk_size > 0` and `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::ZeroSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                overlap: chunk_overlap,
                size: chunk_size,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split all segments in order. Chunk indices run across the whole document.
    pub fn split(&self, segments: &[Segment]) -> SplitOutcome {
        let mut outcome = SplitOutcome::default();
        for segment in segments {
            if segment.text.trim().is_empty() {
                continue;
            }
            let flat = flatten_metadata(&segment.metadata);
            for (text, start, end) in self.split_text(&segment.text) {
                let Some(metadata) = flat.clone() else {
                    outcome.dropped += 1;
                    continue;
                };
                outcome.chunks.push(Chunk {
                    index: outcome.chunks.len(),
                    text,
                    metadata,
                    start,
                    end,
                });
            }
        }
        if outcome.dropped > 0 {
            tracing::warn!(dropped = outcome.dropped, "dropped chunks with unflattenable metadata");
        }
        outcome
    }

    /// Splits text into `(chunk, start, end)` windows of at most `chunk_size` chars.
    /// Consecutive windows share exactly `chunk_overlap` chars.
    pub fn split_text(&self, text: &str) -> Vec<(String, usize, usize)> {
        // Byte offset of every char boundary, including the end of the text.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;

        let mut result = Vec::new();
        let mut start = 0;
        while start < total {
            let limit = (start + self.chunk_size).min(total);
            let end = if limit == total {
                total
            } else {
                self.find_cut(text, &bounds, start, limit)
            };
            result.push((text[bounds[start]..bounds[end]].to_string(), start, end));
            if end == total {
                break;
            }
            start = end - self.chunk_overlap;
        }
        result
    }

    /// Picks the cut (in chars) for the window `start..limit`: just after the last
    /// occurrence of the coarsest separator tier that leaves room for progress.
    fn find_cut(&self, text: &str, bounds: &[usize], start: usize, limit: usize) -> usize {
        let min_cut = start + self.chunk_overlap;
        let window = &text[bounds[start]..bounds[limit]];
        for tier in SEPARATORS {
            let Some(end) = tier
                .iter()
                .filter_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
                .max()
            else {
                continue;
            };
            let cut_byte = bounds[start] + end;
            if let Ok(cut) = bounds.binary_search(&cut_byte) {
                if cut > min_cut {
                    return cut;
                }
            }
        }
        limit
    }
}

/// Flattens nested metadata into dotted scalar keys. Nulls and arrays are dropped.
/// Returns `None` when two values flatten to the same key.
pub fn flatten_metadata(metadata: &Metadata) -> Option<BTreeMap<String, Scalar>> {
    let mut out = BTreeMap::new();
    for (key, value) in metadata {
        if !flatten_into(&mut out, key.clone(), value) {
            return None;
        }
    }
    Some(out)
}

fn flatten_into(out: &mut BTreeMap<String, Scalar>, key: String, value: &Value) -> bool {
    let scalar = match value {
        Value::Null | Value::Array(_) => return true,
        Value::Bool(b) => Scalar::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Scalar::Int(i),
            None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Scalar::Str(s.clone()),
        Value::Object(map) => {
            return map
                .iter()
                .all(|(k, v)| flatten_into(out, format!("{key}.{k}"), v));
        }
    };
    out.insert(key, scalar).is_none()
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk_size must be greater than zero")]
    ZeroSize,
    #[error("chunk_overlap ({overlap}) must be less than chunk_size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },
}
