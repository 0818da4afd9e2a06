//! Embedding capability.
//!
//! The index and the query path must embed with the same model; the
//! [`EncoderIdentity`] recorded in the store is how that is checked.

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RagError, Result};

/// Model name and output dimension an index was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderIdentity {
    pub model: String,
    /// Vector width, 0 when nothing has been encoded (empty store).
    pub dimension: usize,
}

impl std::fmt::Display for EncoderIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (dim {})", self.model, self.dimension)
    }
}

#[async_trait]
pub trait Encoder: Send + Sync {
    /// Model identifier recorded in the index manifest.
    fn model(&self) -> &str;

    /// Output dimension, when the encoder knows it up front.
    fn dimension(&self) -> Option<usize> {
        None
    }

    /// Encode texts in order; output has one vector per input.
    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.encode_batch(&[text.to_string()]).await?;
        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            n => Err(RagError::EncodingFailure(format!(
                "encoder returned {} vectors for 1 input",
                n
            ))),
        }
    }
}

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints.
pub struct HttpEncoder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: Option<usize>,
    api_key: Option<String>,
}

impl HttpEncoder {
    pub fn new(
        base_url: String,
        model: String,
        dimensions: Option<usize>,
        api_key: Option<String>,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create embedding HTTP client")?;

        Ok(Self {
            client,
            base_url,
            model,
            dimensions,
            api_key,
        })
    }

    /// Resolve the embeddings endpoint from the base URL.
    fn endpoint(&self) -> String {
        resolve_endpoint(&self.base_url, "embeddings")
    }
}

/// Accepts a bare host, a `/v1` base, or the full endpoint URL.
pub fn resolve_endpoint(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with(&format!("/{}", path)) {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{}/{}", base, path)
    } else {
        format!("{}/v1/{}", base, path)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Order entries by their `index` and check one came back per input.
fn parse_embeddings(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| RagError::EncodingFailure(format!("unparseable embedding response: {}", e)))?;
    parsed.data.sort_by_key(|entry| entry.index);
    if parsed.data.len() != expected {
        return Err(RagError::EncodingFailure(format!(
            "encoder returned {} embeddings for {} inputs",
            parsed.data.len(),
            expected
        )));
    }
    Ok(parsed.data.into_iter().map(|e| e.embedding).collect())
}

#[async_trait]
impl Encoder for HttpEncoder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> Option<usize> {
        self.dimensions
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };
        let mut req = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| RagError::EncodingFailure(format!("embedding request failed: {}", e)))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RagError::EncodingFailure(format!("failed to read embedding response: {}", e)))?;
        if !status.is_success() {
            return Err(RagError::EncodingFailure(format!(
                "embedding endpoint returned {}: {}",
                status, body
            )));
        }

        let vectors = parse_embeddings(&body, texts.len())?;
        debug!(model = %self.model, batch = texts.len(), "embedded batch");
        Ok(vectors)
    }
}
