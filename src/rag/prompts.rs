/// Returned verbatim by the generator when the context lacks the answer.
pub const REFUSAL: &str = "I could not find this information in the available documents.";

/// Shown to the user when a query failed (encoder, search or generator error).
/// Distinct from [`REFUSAL`], which is a successful answer.
pub const QUERY_FAILED: &str = "Sorry, I could not answer that question right now. Please try again.";

pub const QUESTION_HEADER: &str = "User Question:";
pub const CONTEXT_HEADER: &str = "Context from";
pub const CLOSING: &str = "Answer the question in a clear, concise manner.";

/// Who the assistant is and what corpus it speaks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub assistant_name: String,
    pub corpus_description: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            assistant_name: "Loan Product Assistant".to_string(),
            corpus_description: "Bank of Maharashtra loan documents".to_string(),
        }
    }
}

impl Persona {
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}, an assistant that answers questions using only {}.",
            self.assistant_name, self.corpus_description
        )
    }
}

/// The single instruction prompt sent to the generator.
pub fn build_prompt(persona: &Persona, question: &str, context: &str) -> String {
    format!(
        r#"You are a helpful assistant called '{name}'.

Rules:
1. Answer user questions ONLY using the information provided in the context.
2. If the answer is not found in the context, reply exactly: "{refusal}"
3. Keep answers clear and concise.
4. Use bullet points or short paragraphs where possible for readability.
5. Do NOT add extra commentary like "let me know if you need more details."

{question_header}
{question}

{context_header} {corpus}:
{context}

{closing}
"#,
        name = persona.assistant_name,
        refusal = REFUSAL,
        question_header = QUESTION_HEADER,
        question = question.trim(),
        context_header = CONTEXT_HEADER,
        corpus = persona.corpus_description,
        context = context,
        closing = CLOSING,
    )
}
