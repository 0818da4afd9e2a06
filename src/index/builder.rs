use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::docs::types::Chunk;
use crate::embed::{Encoder, EncoderIdentity};
use crate::error::{RagError, Result};

use super::flat::FlatL2Index;
use super::{ChunkMeta, IndexStore};

#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Texts per encoder request.
    pub batch_size: usize,
    /// Encoder requests in flight at once. Results are reassembled in order.
    pub concurrency: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            batch_size: 64,
            concurrency: 4,
        }
    }
}

/// Encode every chunk and assemble an [`IndexStore`] whose position `i` is
/// `chunks[i]`.
pub async fn build(
    chunks: &[Chunk],
    encoder: &dyn Encoder,
    options: BuildOptions,
) -> Result<IndexStore> {
    if chunks.is_empty() {
        info!(model = encoder.model(), "no chunks to index, building empty store");
        return IndexStore::from_parts(
            FlatL2Index::empty(),
            Vec::new(),
            EncoderIdentity {
                model: encoder.model().to_string(),
                dimension: 0,
            },
            Utc::now(),
        );
    }

    let batch_size = options.batch_size.max(1);
    let batches: Vec<Vec<String>> = chunks
        .chunks(batch_size)
        .map(|batch| batch.iter().map(|c| c.text.clone()).collect())
        .collect();
    let batch_count = batches.len();

    let encoded: Vec<Vec<Vec<f32>>> = futures::stream::iter(batches.into_iter().enumerate())
        .map(|(i, texts)| async move {
            let vectors = encoder.encode_batch(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(RagError::EncodingFailure(format!(
                    "batch {} returned {} vectors for {} texts",
                    i,
                    vectors.len(),
                    texts.len()
                )));
            }
            debug!(batch = i + 1, of = batch_count, "batch encoded");
            Ok(vectors)
        })
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await?;

    let mut vectors = encoded.into_iter().flatten();
    let first = vectors
        .next()
        .ok_or_else(|| RagError::EncodingFailure("encoder returned no vectors".to_string()))?;
    let dimension = first.len();
    if dimension == 0 {
        return Err(RagError::EncodingFailure(
            "encoder returned zero-length vectors".to_string(),
        ));
    }
    if let Some(expected) = encoder.dimension() {
        if expected != dimension {
            return Err(RagError::EncodingFailure(format!(
                "encoder declared dimension {} but produced {}",
                expected, dimension
            )));
        }
    }

    let mut index = FlatL2Index::new(dimension);
    index.add(&first)?;
    for vector in vectors {
        index.add(&vector)?;
    }

    let metadata: Vec<ChunkMeta> = chunks.iter().map(ChunkMeta::from).collect();
    let store = IndexStore::from_parts(
        index,
        metadata,
        EncoderIdentity {
            model: encoder.model().to_string(),
            dimension,
        },
        Utc::now(),
    )?;

    info!(
        chunks = store.len(),
        dimension,
        batches = batch_count,
        model = encoder.model(),
        "index built"
    );
    Ok(store)
}
