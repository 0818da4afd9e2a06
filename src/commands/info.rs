use std::path::PathBuf;

use clap::Args;

use crate::index::persist::read_manifest;
use crate::state::RagConfig;

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Index directory (defaults to RAG_INDEX_DIR)
    #[arg(long)]
    pub index: Option<PathBuf>,
}

pub async fn run(args: InfoArgs, config: &RagConfig) -> anyhow::Result<()> {
    let dir = super::index_dir(&args.index, config);
    let manifest = read_manifest(&dir)?;
    println!("index:     {}", dir.display());
    println!("model:     {}", manifest.encoder.model);
    println!("dimension: {}", manifest.encoder.dimension);
    println!("chunks:    {}", manifest.count);
    println!("built at:  {}", manifest.built_at.to_rfc3339());
    Ok(())
}
