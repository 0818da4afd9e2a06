pub mod ask;
pub mod build;
pub mod chunk;
pub mod info;
pub mod search;

use std::path::PathBuf;

use crate::state::RagConfig;

/// `--index` when given, otherwise `RAG_INDEX_DIR`.
pub(crate) fn index_dir(flag: &Option<PathBuf>, config: &RagConfig) -> PathBuf {
    flag.clone().unwrap_or_else(|| config.index_dir.clone())
}

/// Cut `text` to at most `max` chars on a char boundary, marking the cut.
pub(crate) fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
