use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use crate::embed::Encoder;
use crate::rag::retriever::Retriever;
use crate::state::{load_store, RagConfig};

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Index directory (defaults to RAG_INDEX_DIR)
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Number of passages (defaults to RAG_TOP_K or 5)
    #[arg(short)]
    pub k: Option<usize>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    pub query: String,
}

pub async fn run(args: SearchArgs, config: &RagConfig) -> anyhow::Result<()> {
    let store = Arc::new(load_store(&super::index_dir(&args.index, config)).await?);
    let encoder = config.encoder.connect(config.query_timeout)?;
    store.verify_encoder(encoder.model(), encoder.dimension())?;

    let retriever = Retriever::new(store, Arc::new(encoder));
    let results = retriever
        .retrieve(&args.query, args.k.unwrap_or(config.top_k))
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("index is empty");
    }
    for r in &results {
        println!(
            "{:>2}. [{:.4}] {} #{}  {}",
            r.rank, r.score, r.metadata.title, r.metadata.chunk_index, r.metadata.url
        );
        println!("    {}", super::preview(&r.text, 160));
    }
    Ok(())
}
