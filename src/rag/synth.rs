use tracing::debug;

use crate::error::{RagError, Result};
use crate::llm::Generator;

use super::prompts::{build_prompt, Persona};
use super::retriever::RetrievalResult;

/// Join retrieved passages, each tagged `[Doc {rank}]` so the model can refer
/// back to them. Empty input gives an empty block.
pub fn build_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .map(|r| format!("[Doc {}] {}", r.rank, r.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Ask the generator once, grounded on `results`.
///
/// No short-circuit on empty results: the prompt's refusal rule decides.
pub async fn synthesize(
    persona: &Persona,
    query: &str,
    results: &[RetrievalResult],
    generator: &dyn Generator,
) -> Result<String> {
    let context = build_context(results);
    let prompt = build_prompt(persona, query, &context);
    debug!(
        passages = results.len(),
        prompt_len = prompt.len(),
        "sending grounded prompt"
    );

    let answer = generator.generate(&prompt).await.map_err(|e| match e {
        RagError::GenerationFailure(_) | RagError::Timeout { .. } => e,
        other => RagError::GenerationFailure(other.to_string()),
    })?;

    let answer = answer.trim();
    if answer.is_empty() {
        return Err(RagError::GenerationFailure(
            "generator returned an empty response".to_string(),
        ));
    }
    Ok(answer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ChunkRef;
    use crate::rag::prompts::REFUSAL;
    use crate::testing::{GroundedGenerator, ScriptedGenerator};

    fn result(rank: usize, text: &str) -> RetrievalResult {
        RetrievalResult {
            rank,
            text: text.to_string(),
            metadata: ChunkRef {
                chunk_id: format!("d_chunk{}", rank),
                url: "https://x.test".to_string(),
                title: "Loans".to_string(),
                chunk_index: rank,
            },
            score: rank as f32,
        }
    }

    fn loan_results() -> Vec<RetrievalResult> {
        vec![
            result(1, "home loan interest rate is 8.5%"),
            result(2, "personal loan eligibility criteria"),
        ]
    }

    #[test]
    fn test_context_tags_each_passage() {
        assert_eq!(
            build_context(&loan_results()),
            "[Doc 1] home loan interest rate is 8.5%\n\n[Doc 2] personal loan eligibility criteria"
        );
        assert_eq!(build_context(&[]), "");
    }

    #[tokio::test]
    async fn test_out_of_domain_question_is_refused_verbatim() {
        let generator = GroundedGenerator::default();
        let answer = synthesize(
            &Persona::default(),
            "what is the capital of France",
            &loan_results(),
            &generator,
        )
        .await
        .unwrap();
        assert_eq!(answer, REFUSAL);
    }

    #[tokio::test]
    async fn test_in_domain_question_is_answered_from_context() {
        let generator = GroundedGenerator::default();
        let answer = synthesize(
            &Persona::default(),
            "what is the home loan interest rate",
            &loan_results(),
            &generator,
        )
        .await
        .unwrap();
        assert!(answer.contains("8.5%"), "{}", answer);
    }

    #[tokio::test]
    async fn test_empty_results_still_call_generator() {
        let generator = GroundedGenerator::default();
        let answer = synthesize(&Persona::default(), "home loan rate", &[], &generator)
            .await
            .unwrap();
        assert_eq!(answer, REFUSAL);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_single_call_with_full_prompt() {
        let generator = ScriptedGenerator::replying("  Rate is 8.5%.\n");
        let answer = synthesize(&Persona::default(), "rate?", &loan_results(), &generator)
            .await
            .unwrap();
        assert_eq!(answer, "Rate is 8.5%.");

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("[Doc 2] personal loan eligibility criteria"));
        assert!(prompts[0].contains(REFUSAL));
    }

    #[tokio::test]
    async fn test_blank_response_is_generation_failure() {
        let generator = ScriptedGenerator::replying(" \n ");
        let err = synthesize(&Persona::default(), "rate?", &loan_results(), &generator)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::GenerationFailure(_)));
    }

    #[tokio::test]
    async fn test_generator_error_is_generation_failure() {
        let generator = ScriptedGenerator::failing();
        let err = synthesize(&Persona::default(), "rate?", &loan_results(), &generator)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::GenerationFailure(_)));
    }
}
