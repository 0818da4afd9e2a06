//! The Index Store: an exact vector index and its positionally aligned
//! metadata, always built, saved and loaded as one value.

pub mod builder;
pub mod flat;
pub mod persist;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::docs::types::Chunk;
use crate::embed::EncoderIdentity;
use crate::error::{RagError, Result};

use flat::{FlatL2Index, Neighbor};

/// Metadata kept for the vector at the same position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub chunk_id: String,
    pub url: String,
    pub title: String,
    pub chunk_index: usize,
    /// Passage text returned to the synthesizer.
    pub text: String,
}

impl From<&Chunk> for ChunkMeta {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            url: chunk.url.clone(),
            title: chunk.title.clone(),
            chunk_index: chunk.chunk_index,
            text: chunk.text.clone(),
        }
    }
}

impl ChunkMeta {
    /// The provenance half of the record, without the passage text.
    pub fn reference(&self) -> ChunkRef {
        ChunkRef {
            chunk_id: self.chunk_id.clone(),
            url: self.url.clone(),
            title: self.title.clone(),
            chunk_index: self.chunk_index,
        }
    }
}

/// Where a retrieved passage came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub chunk_id: String,
    pub url: String,
    pub title: String,
    pub chunk_index: usize,
}

/// Immutable once constructed; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct IndexStore {
    index: FlatL2Index,
    metadata: Vec<ChunkMeta>,
    encoder: EncoderIdentity,
    built_at: DateTime<Utc>,
}

impl IndexStore {
    /// Join the two halves, refusing any length mismatch.
    pub fn from_parts(
        index: FlatL2Index,
        metadata: Vec<ChunkMeta>,
        encoder: EncoderIdentity,
        built_at: DateTime<Utc>,
    ) -> Result<Self> {
        if index.len() != metadata.len() {
            return Err(RagError::CorruptIndexStore(format!(
                "index holds {} vectors but metadata has {} records",
                index.len(),
                metadata.len()
            )));
        }
        if index.dimension() != encoder.dimension {
            return Err(RagError::CorruptIndexStore(format!(
                "index dimension {} disagrees with recorded encoder dimension {}",
                index.dimension(),
                encoder.dimension
            )));
        }
        Ok(Self {
            index,
            metadata,
            encoder,
            built_at,
        })
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Vector width, 0 for an empty store.
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn encoder(&self) -> &EncoderIdentity {
        &self.encoder
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub(crate) fn index(&self) -> &FlatL2Index {
        &self.index
    }

    pub(crate) fn all_metadata(&self) -> &[ChunkMeta] {
        &self.metadata
    }

    /// Exact k-nearest search; `(position, distance)` pairs nearest first.
    pub fn search(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.index.search(vector, k)
    }

    pub fn metadata(&self, position: usize) -> Option<&ChunkMeta> {
        self.metadata.get(position)
    }

    /// Check that the runtime encoder is the one this store was built with.
    ///
    /// An empty store has no dimension to compare, only the model name.
    pub fn verify_encoder(&self, model: &str, dimension: Option<usize>) -> Result<()> {
        let model_matches = self.encoder.model == model;
        let dimension_matches = match dimension {
            Some(d) => self.encoder.dimension == 0 || self.encoder.dimension == d,
            None => true,
        };
        if model_matches && dimension_matches {
            return Ok(());
        }

        let runtime = match dimension {
            Some(d) => format!("{} (dim {})", model, d),
            None => model.to_string(),
        };
        Err(RagError::EncoderVersionMismatch {
            built: self.encoder.to_string(),
            runtime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str) -> ChunkMeta {
        ChunkMeta {
            chunk_id: id.to_string(),
            url: "https://x.test".to_string(),
            title: "t".to_string(),
            chunk_index: 1,
            text: id.to_string(),
        }
    }

    fn identity(dimension: usize) -> EncoderIdentity {
        EncoderIdentity {
            model: "mini".to_string(),
            dimension,
        }
    }

    #[test]
    fn test_from_parts_rejects_length_mismatch() {
        let mut index = FlatL2Index::new(2);
        index.add(&[1.0, 0.0]).unwrap();
        let err = IndexStore::from_parts(index, vec![meta("a"), meta("b")], identity(2), Utc::now())
            .unwrap_err();
        assert!(matches!(err, RagError::CorruptIndexStore(_)));
    }

    #[test]
    fn test_from_parts_rejects_dimension_disagreement() {
        let mut index = FlatL2Index::new(2);
        index.add(&[1.0, 0.0]).unwrap();
        assert!(IndexStore::from_parts(index, vec![meta("a")], identity(3), Utc::now()).is_err());
    }

    #[test]
    fn test_verify_encoder() {
        let mut index = FlatL2Index::new(2);
        index.add(&[1.0, 0.0]).unwrap();
        let store = IndexStore::from_parts(index, vec![meta("a")], identity(2), Utc::now()).unwrap();

        assert!(store.verify_encoder("mini", Some(2)).is_ok());
        assert!(store.verify_encoder("mini", None).is_ok());
        assert!(matches!(
            store.verify_encoder("mini", Some(384)),
            Err(RagError::EncoderVersionMismatch { .. })
        ));
        assert!(matches!(
            store.verify_encoder("other-model", Some(2)),
            Err(RagError::EncoderVersionMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_store_accepts_any_dimension_for_same_model() {
        let store =
            IndexStore::from_parts(FlatL2Index::empty(), vec![], identity(0), Utc::now()).unwrap();
        assert!(store.is_empty());
        assert!(store.verify_encoder("mini", Some(768)).is_ok());
        assert!(store.verify_encoder("bigger", Some(768)).is_err());
        assert!(store.search(&[0.0; 768], 5).unwrap().is_empty());
    }
}
