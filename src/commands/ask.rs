use std::path::PathBuf;

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use crate::rag::prompts::QUERY_FAILED;
use crate::rag::{RagEngine, RagResponse};
use crate::state::{AppState, RagConfig};

#[derive(Debug, Args)]
pub struct AskArgs {
    /// Index directory (defaults to RAG_INDEX_DIR)
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Number of passages given to the model (defaults to RAG_TOP_K or 5)
    #[arg(short)]
    pub k: Option<usize>,

    /// List the retrieved passages under each answer
    #[arg(long)]
    pub sources: bool,

    /// Question to answer; reads one question per line from stdin when absent
    pub question: Option<String>,
}

pub async fn run(args: AskArgs, config: &RagConfig) -> anyhow::Result<()> {
    let state = AppState::load(config, &super::index_dir(&args.index, config)).await?;
    let k = args.k.unwrap_or(config.top_k);

    if let Some(question) = &args.question {
        return answer_one(&state.engine, question, k, args.sources).await;
    }

    info!(chunks = state.store.len(), "reading questions from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        answer_one(&state.engine, question, k, args.sources).await?;
    }
    Ok(())
}

/// Answer and print. A per-query failure is reported and the session goes
/// on; only fatal store errors end it.
async fn answer_one(
    engine: &RagEngine,
    question: &str,
    k: usize,
    sources: bool,
) -> anyhow::Result<()> {
    match engine.answer(question, k).await {
        Ok(response) => println!("{}", render(&response, sources)),
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(e) => {
            error!(error = %e, stage = ?e.stage(), "query failed");
            println!("{}", QUERY_FAILED);
        }
    }
    Ok(())
}

fn render(response: &RagResponse, sources: bool) -> String {
    let mut out = response.answer.clone();
    if sources && !response.refused && !response.results.is_empty() {
        out.push_str("\n\nSources:\n");
        for r in &response.results {
            out.push_str(&format!(
                "- [Doc {}] {} ({})\n",
                r.rank, r.metadata.title, r.metadata.url
            ));
        }
    }
    out
}
