use serde::{Deserialize, Serialize};

/// URL-derived document ID (truncated blake3 hex hash).
pub type DocId = String;

const DOC_ID_LEN: usize = 16;

/// Deterministic ID for a source URL. Re-scraping the same URL yields the same ID.
pub fn doc_id_for_url(url: &str) -> DocId {
    let hex = blake3::hash(url.as_bytes()).to_hex();
    hex[..DOC_ID_LEN].to_string()
}

/// A cleaned document as emitted by the crawler, one per JSONL line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: DocId,
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// RFC 3339 timestamp of the fetch, when the crawler recorded one.
    #[serde(default)]
    pub scrape_date: Option<String>,
    #[serde(default)]
    pub text: String,
}

impl Document {
    /// Fill in the URL-derived ID when the producer left it blank.
    pub fn with_resolved_id(mut self) -> Self {
        if self.id.trim().is_empty() {
            self.id = doc_id_for_url(&self.url);
        }
        self
    }
}

/// A word window of a document, the unit that gets embedded and retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub source_id: DocId,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub scrape_date: Option<String>,
    /// 1-based position of this window within its source document.
    pub chunk_index: usize,
    pub text: String,
}

pub fn chunk_id(source_id: &str, chunk_index: usize) -> String {
    format!("{}_chunk{}", source_id, chunk_index)
}
