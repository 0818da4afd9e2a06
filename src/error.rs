use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias for retrieval engine operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Pipeline stage a per-query failure belongs to, so callers can target retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Encoding,
    Search,
    Generation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Encoding => "encoding",
            Stage::Search => "search",
            Stage::Generation => "generation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid chunk config: chunk_size={chunk_size}, overlap={overlap} (need 0 <= overlap < chunk_size)")]
    InvalidChunkConfig { chunk_size: usize, overlap: usize },

    #[error("encoding failed: {0}")]
    EncodingFailure(String),

    #[error("missing index artifact: {}", .0.display())]
    MissingIndexArtifact(PathBuf),

    #[error("corrupt index store: {0}")]
    CorruptIndexStore(String),

    #[error("search failed: {0}")]
    SearchFailure(String),

    #[error("generation failed: {0}")]
    GenerationFailure(String),

    #[error("encoder mismatch: index built with {built}, runtime encoder is {runtime}")]
    EncoderVersionMismatch { built: String, runtime: String },

    #[error("{stage} timed out after {elapsed:?}")]
    Timeout { stage: Stage, elapsed: Duration },

    #[error("malformed record at {}:{line}: {source}", .path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RagError {
    /// The query stage this error belongs to, if it is a per-query failure.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RagError::EncodingFailure(_) => Some(Stage::Encoding),
            RagError::SearchFailure(_) => Some(Stage::Search),
            RagError::GenerationFailure(_) => Some(Stage::Generation),
            RagError::Timeout { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Structural errors mean the store or configuration cannot be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RagError::InvalidChunkConfig { .. }
                | RagError::MissingIndexArtifact(_)
                | RagError::CorruptIndexStore(_)
                | RagError::EncoderVersionMismatch { .. }
                | RagError::MalformedRecord { .. }
        )
    }
}
