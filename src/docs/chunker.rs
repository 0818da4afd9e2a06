//! Overlapping word-window chunker.
//!
//! Text is whitespace-normalised first so window boundaries do not depend on
//! the source formatting. Windows are `chunk_size` words wide and start every
//! `chunk_size - overlap` words; the last window is whatever tail remains.

use crate::error::{RagError, Result};

use super::types::{chunk_id, Chunk, Document};

pub const DEFAULT_CHUNK_SIZE: usize = 400;
pub const DEFAULT_OVERLAP: usize = 50;

/// Window configuration. Construct through [`ChunkConfig::new`] so the
/// `overlap < chunk_size` rule is checked once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    chunk_size: usize,
    overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(RagError::InvalidChunkConfig {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Words the window start advances by between consecutive chunks.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into overlapping word windows.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    let config = ChunkConfig::new(chunk_size, overlap)?;
    Ok(split_windows(&clean_text(text), config))
}

fn split_windows(cleaned: &str, config: ChunkConfig) -> Vec<String> {
    let words: Vec<&str> = cleaned.split(' ').filter(|w| !w.is_empty()).collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + config.chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        start += config.stride();
    }

    chunks
}

/// Chunk one document and attach provenance. Empty documents yield nothing.
pub fn chunk_document(doc: &Document, config: ChunkConfig) -> Result<Vec<Chunk>> {
    let windows = chunk_text(&doc.text, config.chunk_size, config.overlap)?;
    Ok(windows
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let chunk_index = i + 1;
            Chunk {
                chunk_id: chunk_id(&doc.id, chunk_index),
                source_id: doc.id.clone(),
                url: doc.url.clone(),
                title: doc.title.clone(),
                scrape_date: doc.scrape_date.clone(),
                chunk_index,
                text,
            }
        })
        .collect())
}
