mod commands;
mod docs;
mod embed;
mod error;
mod index;
mod llm;
mod rag;
mod state;
#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::{ask::AskArgs, build::BuildArgs, chunk::ChunkArgs, info::InfoArgs, search::SearchArgs};
use state::RagConfig;

#[derive(Parser)]
#[command(name = "groundline")]
#[command(about = "Answer questions from a document corpus, grounded in retrieved passages")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split document records into overlapping word-window chunks
    Chunk(ChunkArgs),
    /// Embed chunks and write the index store
    Build(BuildArgs),
    /// Show the top-k passages for a query
    Search(SearchArgs),
    /// Answer questions from the indexed corpus
    Ask(AskArgs),
    /// Print what an index store was built with
    Info(InfoArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load env first: RUST_LOG may come from .env
    let _ = dotenv::dotenv();
    let directive = log_directive(|key| dotenv::var(key).ok());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RagConfig::from_env()?;
    debug!(
        index_dir = %config.index_dir.display(),
        embed_model = %config.encoder.model,
        top_k = config.top_k,
        timeout = ?config.query_timeout,
        "configuration loaded"
    );
    match cli.command {
        Command::Chunk(args) => commands::chunk::run(args, &config).await,
        Command::Build(args) => commands::build::run(args, &config).await,
        Command::Search(args) => commands::search::run(args, &config).await,
        Command::Ask(args) => commands::ask::run(args, &config).await,
        Command::Info(args) => commands::info::run(args, &config).await,
    }
}

/// `RUST_LOG` when set, otherwise `info`.
fn log_directive(lookup: impl Fn(&str) -> Option<String>) -> String {
    lookup("RUST_LOG")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "info".to_string())
}
