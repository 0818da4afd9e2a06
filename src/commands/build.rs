use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use tracing::info;

use crate::docs::read_chunks;
use crate::index::builder::{build, BuildOptions};
use crate::state::RagConfig;

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Chunk records produced by `chunk`
    #[arg(long)]
    pub chunks: PathBuf,

    /// Index directory to write (defaults to RAG_INDEX_DIR)
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Texts per embedding request (defaults to RAG_EMBED_BATCH or 64)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Embedding requests in flight at once
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,
}

pub async fn run(args: BuildArgs, config: &RagConfig) -> anyhow::Result<()> {
    let index_dir = super::index_dir(&args.index, config);
    let chunks_path = args.chunks.clone();
    let chunks = tokio::task::spawn_blocking(move || read_chunks(&chunks_path))
        .await
        .context("chunk reading task panicked")??;
    info!(chunks = chunks.len(), path = %args.chunks.display(), "chunks loaded");

    let encoder = config.encoder.connect(config.query_timeout)?;
    let options = BuildOptions {
        batch_size: args.batch_size.unwrap_or(config.embed_batch),
        concurrency: args.concurrency,
    };
    let store = build(&chunks, &encoder, options).await?;

    let dir = index_dir.clone();
    let manifest = tokio::task::spawn_blocking(move || store.save(&dir))
        .await
        .context("index save task panicked")??;

    println!(
        "indexed {} chunks with {} into {}",
        manifest.count,
        manifest.encoder,
        index_dir.display()
    );
    Ok(())
}
