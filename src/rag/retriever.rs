use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embed::Encoder;
use crate::error::{RagError, Result};
use crate::index::{ChunkRef, IndexStore};

/// One ranked passage. `score` is the squared L2 distance: lower is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub rank: usize,
    pub text: String,
    pub metadata: ChunkRef,
    pub score: f32,
}

/// Stateless per call; clones share the same store.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<IndexStore>,
    encoder: Arc<dyn Encoder>,
}

impl Retriever {
    pub fn new(store: Arc<IndexStore>, encoder: Arc<dyn Encoder>) -> Self {
        Self { store, encoder }
    }

    /// Top `k` chunks for `query`, nearest first. Returns `min(k, n)` results
    /// and never filters by relevance.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        match self.encode_query(query, k).await? {
            Some(vector) => self.rank(&vector, k),
            None => Ok(Vec::new()),
        }
    }

    /// Validate `k` and embed the query. `None` when the store is empty and
    /// there is nothing to search, in which case the encoder is not called.
    pub async fn encode_query(&self, query: &str, k: usize) -> Result<Option<Vec<f32>>> {
        if k == 0 {
            return Err(RagError::SearchFailure("k must be at least 1".to_string()));
        }
        if self.store.is_empty() {
            debug!("empty index, nothing to retrieve");
            return Ok(None);
        }

        let vector = self.encoder.encode(query).await?;
        if vector.len() != self.store.dimension() {
            return Err(RagError::EncodingFailure(format!(
                "query vector has dimension {}, index expects {}",
                vector.len(),
                self.store.dimension()
            )));
        }
        Ok(Some(vector))
    }

    /// Search with an already encoded query and attach passage metadata.
    pub fn rank(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        let hits = self.store.search(vector, k)?;
        let results = hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| {
                let meta = self.store.metadata(hit.position).ok_or_else(|| {
                    RagError::SearchFailure(format!("no metadata at position {}", hit.position))
                })?;
                Ok(RetrievalResult {
                    rank: i + 1,
                    text: meta.text.clone(),
                    metadata: meta.reference(),
                    score: hit.distance,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            k,
            returned = results.len(),
            best = results.first().map(|r| r.score),
            "retrieval complete"
        );
        Ok(results)
    }
}
