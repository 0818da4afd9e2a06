pub mod chunker;
pub mod types;

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{RagError, Result};

use chunker::{chunk_document, ChunkConfig};
use types::{Chunk, Document};

/// Totals reported by [`chunk_corpus`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkStats {
    pub documents: usize,
    pub skipped: usize,
    pub chunks: usize,
}

/// Read a JSONL file in order. Blank lines are skipped; a malformed line
/// fails with its 1-based line number.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let mut records = Vec::new();

    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record =
            serde_json::from_str(&line).map_err(|source| RagError::MalformedRecord {
                path: path.to_path_buf(),
                line: i + 1,
                source,
            })?;
        records.push(record);
    }

    Ok(records)
}

/// Write records as JSONL to a temporary sibling, then rename into place.
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_sibling(path);
    {
        let mut out = BufWriter::new(File::create(&tmp)?);
        for record in records {
            serde_json::to_writer(&mut out, record)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        out.get_ref().sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".tmp-{}", std::process::id()));
    path.with_file_name(name)
}

pub fn read_documents(path: &Path) -> Result<Vec<Document>> {
    Ok(read_jsonl::<Document>(path)?
        .into_iter()
        .map(Document::with_resolved_id)
        .collect())
}

/// Chunks are consumed in file order; that order becomes index position.
pub fn read_chunks(path: &Path) -> Result<Vec<Chunk>> {
    read_jsonl(path)
}

/// Chunk every document in order. Documents with no text are skipped.
pub fn chunk_documents(docs: &[Document], config: ChunkConfig) -> Result<(Vec<Chunk>, ChunkStats)> {
    let mut stats = ChunkStats::default();
    let mut chunks = Vec::new();

    for doc in docs {
        stats.documents += 1;
        let doc_chunks = chunk_document(doc, config)?;
        if doc_chunks.is_empty() {
            stats.skipped += 1;
            debug!(doc_id = %doc.id, url = %doc.url, "skipping document with no text");
            continue;
        }
        chunks.extend(doc_chunks);
    }

    stats.chunks = chunks.len();
    Ok((chunks, stats))
}

/// Documents JSONL in, chunk JSONL out.
pub fn chunk_corpus(input: &Path, output: &Path, config: ChunkConfig) -> Result<ChunkStats> {
    let docs = read_documents(input)?;
    let (chunks, stats) = chunk_documents(&docs, config)?;
    write_jsonl(output, &chunks)?;

    info!(
        documents = stats.documents,
        skipped = stats.skipped,
        chunks = stats.chunks,
        chunk_size = config.chunk_size(),
        overlap = config.overlap(),
        output = %output.display(),
        "corpus chunked"
    );
    Ok(stats)
}
