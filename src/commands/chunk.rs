use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;

use crate::docs::chunk_corpus;
use crate::state::RagConfig;

#[derive(Debug, Args)]
pub struct ChunkArgs {
    /// Document records, one JSON object per line
    #[arg(long)]
    pub input: PathBuf,

    /// Where to write chunk records (JSONL)
    #[arg(long)]
    pub output: PathBuf,

    /// Words per chunk (defaults to RAG_CHUNK_SIZE or 400)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Words shared by consecutive chunks (defaults to RAG_CHUNK_OVERLAP or 50)
    #[arg(long)]
    pub overlap: Option<usize>,
}

pub async fn run(args: ChunkArgs, config: &RagConfig) -> anyhow::Result<()> {
    let mut settings = config.clone();
    if let Some(chunk_size) = args.chunk_size {
        settings.chunk_size = chunk_size;
    }
    if let Some(overlap) = args.overlap {
        settings.chunk_overlap = overlap;
    }
    let chunk_config = settings.chunk_config()?;

    let stats = tokio::task::spawn_blocking(move || {
        chunk_corpus(&args.input, &args.output, chunk_config)
    })
    .await
    .context("chunking task panicked")??;

    println!(
        "{} documents -> {} chunks ({} skipped)",
        stats.documents, stats.chunks, stats.skipped
    );
    Ok(())
}
