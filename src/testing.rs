//! In-process fakes for the encoder and generator capabilities.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::docs::types::{chunk_id, Chunk};
use crate::embed::Encoder;
use crate::error::{RagError, Result};
use crate::llm::Generator;
use crate::rag::prompts::{CLOSING, CONTEXT_HEADER, QUESTION_HEADER, REFUSAL};

static SCRATCH_SEQ: AtomicUsize = AtomicUsize::new(0);

/// A fresh, empty directory under the system temp dir.
pub fn scratch_dir(label: &str) -> PathBuf {
    let seq = SCRATCH_SEQ.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "groundline-{}-{}-{}",
        label,
        std::process::id(),
        seq
    ));
    if dir.exists() {
        std::fs::remove_dir_all(&dir).unwrap();
    }
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn chunk(source_id: &str, chunk_index: usize, text: &str) -> Chunk {
    Chunk {
        chunk_id: chunk_id(source_id, chunk_index),
        source_id: source_id.to_string(),
        url: format!("https://bank.test/{}", source_id),
        title: format!("Page {}", source_id),
        scrape_date: None,
        chunk_index,
        text: text.to_string(),
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

/// Deterministic bag-of-words encoder over a fixed vocabulary: one dimension
/// per word, value = occurrences. Unknown words are ignored.
pub struct KeywordEncoder {
    vocabulary: Vec<String>,
    calls: AtomicUsize,
    failing: AtomicBool,
    delay_ms: AtomicU64,
    ragged_after: Option<usize>,
    drop_last: bool,
}

impl KeywordEncoder {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_string()).collect(),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            ragged_after: None,
            drop_last: false,
        }
    }

    pub fn loans() -> Self {
        Self::new(&[
            "home",
            "loan",
            "interest",
            "rate",
            "personal",
            "eligibility",
            "criteria",
            "gold",
            "processing",
            "fee",
            "capital",
            "france",
        ])
    }

    /// Texts at batch offset `n` and later get one extra dimension.
    pub fn ragged_after(mut self, n: usize) -> Self {
        self.ragged_after = Some(n);
        self
    }

    /// Every batch comes back one vector short.
    pub fn dropping_last(mut self) -> Self {
        self.drop_last = true;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Sleep this long inside every `encode_batch` call.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.vocabulary.len()];
        for word in words(text) {
            if let Some(i) = self.vocabulary.iter().position(|v| *v == word) {
                vector[i] += 1.0;
            }
        }
        vector
    }
}

#[async_trait]
impl Encoder for KeywordEncoder {
    fn model(&self) -> &str {
        "keyword-test"
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.vocabulary.len())
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RagError::EncodingFailure("encoder unreachable".to_string()));
        }

        let mut vectors: Vec<Vec<f32>> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let mut v = self.vectorize(text);
                if self.ragged_after.is_some_and(|n| i >= n) {
                    v.push(0.0);
                }
                v
            })
            .collect();
        if self.drop_last {
            vectors.pop();
        }
        Ok(vectors)
    }
}

const STOP_WORDS: &[&str] = &["what", "which", "where", "when", "does", "about", "tell", "the"];

/// Split a prompt built by `build_prompt` back into (question, context).
fn parse_prompt(prompt: &str) -> (String, String) {
    let question = prompt
        .split_once(QUESTION_HEADER)
        .and_then(|(_, rest)| rest.split_once(CONTEXT_HEADER))
        .map(|(q, _)| q.trim().to_string())
        .unwrap_or_default();
    let context = prompt
        .split_once(CONTEXT_HEADER)
        .and_then(|(_, rest)| rest.split_once(":\n"))
        .and_then(|(_, rest)| rest.split_once(CLOSING))
        .map(|(c, _)| c.trim().to_string())
        .unwrap_or_default();
    (question, context)
}

/// Follows the prompt's rules the way a well-behaved model would: answers
/// with the first context passage sharing a content word with the question,
/// otherwise the refusal phrase.
#[derive(Default)]
pub struct GroundedGenerator {
    calls: AtomicUsize,
}

impl GroundedGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for GroundedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (question, context) = parse_prompt(prompt);
        let terms: Vec<String> = words(&question)
            .filter(|w| w.len() > 2 && !STOP_WORDS.contains(&w.as_str()))
            .collect();

        let passage = context.split("\n\n").find(|passage| {
            let passage_words: Vec<String> = words(passage).collect();
            terms.iter().any(|t| passage_words.contains(t))
        });
        Ok(match passage {
            Some(p) => format!("According to the documents: {}", p),
            None => REFUSAL.to_string(),
        })
    }
}

/// Returns a canned reply (or error) and records every prompt it saw.
pub struct ScriptedGenerator {
    reply: Option<String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .clone()
            .ok_or_else(|| RagError::GenerationFailure("generator unreachable".to_string()))
    }
}
