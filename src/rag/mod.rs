pub mod prompts;
pub mod retriever;
pub mod synth;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use crate::error::{RagError, Result, Stage};
use crate::llm::Generator;

use prompts::{Persona, REFUSAL};
use retriever::{RetrievalResult, Retriever};

pub struct RagResponse {
    pub answer: String,
    pub results: Vec<RetrievalResult>,
    /// The generator answered with the fixed refusal: nothing relevant found.
    pub refused: bool,
}

/// Retrieve-then-synthesize under one request deadline. Holds no per-query
/// state, so dropping an in-flight `answer` future is safe.
pub struct RagEngine {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    persona: Persona,
    timeout: Duration,
}

impl RagEngine {
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn Generator>,
        persona: Persona,
        timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            generator,
            persona,
            timeout,
        }
    }

    pub async fn answer(&self, question: &str, k: usize) -> Result<RagResponse> {
        let deadline = Instant::now() + self.timeout;

        let vector = timeout_at(deadline, self.retriever.encode_query(question, k))
            .await
            .map_err(|_| self.timed_out(Stage::Encoding))??;
        let results = match vector {
            Some(vector) => {
                let results = self.retriever.rank(&vector, k)?;
                if Instant::now() >= deadline {
                    return Err(self.timed_out(Stage::Search));
                }
                results
            }
            None => Vec::new(),
        };

        let answer = timeout_at(
            deadline,
            synth::synthesize(&self.persona, question, &results, self.generator.as_ref()),
        )
        .await
        .map_err(|_| self.timed_out(Stage::Generation))??;

        let refused = answer.trim() == REFUSAL;
        info!(
            passages = results.len(),
            answer_len = answer.len(),
            refused,
            "query answered"
        );
        Ok(RagResponse {
            answer,
            results,
            refused,
        })
    }

    fn timed_out(&self, stage: Stage) -> RagError {
        warn!(%stage, timeout = ?self.timeout, "query deadline exceeded");
        RagError::Timeout {
            stage,
            elapsed: self.timeout,
        }
    }
}
