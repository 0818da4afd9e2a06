//! On-disk layout of an [`IndexStore`] rooted at `dir`:
//!
//! - `CURRENT`       name of the live generation directory
//! - `gen-NNNNNN/`   one complete build:
//!   - `vectors.bin`   flat L2 index (see [`FlatL2Index::to_bytes`])
//!   - `metadata.json` array of [`ChunkMeta`], aligned with vector positions
//!   - `manifest.json` encoder identity, counts and blake3 of both artifacts
//!
//! A save writes a new generation in full, then repoints `CURRENT` with a
//! rename. Generations are never modified after they are written, so a reader
//! that resolved `CURRENT` once reads a single consistent build. The
//! generation being replaced is kept for readers still on it; older ones are
//! pruned.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embed::EncoderIdentity;
use crate::error::{RagError, Result};

use super::flat::FlatL2Index;
use super::{ChunkMeta, IndexStore};

pub const CURRENT_FILE: &str = "CURRENT";
pub const VECTORS_FILE: &str = "vectors.bin";
pub const METADATA_FILE: &str = "metadata.json";
pub const MANIFEST_FILE: &str = "manifest.json";

const FORMAT_VERSION: u32 = 1;
const GENERATION_PREFIX: &str = "gen-";
const LOAD_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub encoder: EncoderIdentity,
    pub count: usize,
    pub vectors_blake3: String,
    pub metadata_blake3: String,
    pub built_at: DateTime<Utc>,
}

fn generation_name(seq: u64) -> String {
    format!("{}{:06}", GENERATION_PREFIX, seq)
}

fn generation_seq(name: &str) -> Option<u64> {
    name.strip_prefix(GENERATION_PREFIX)?.parse().ok()
}

fn pointer_tmp(dir: &Path) -> PathBuf {
    dir.join(format!("{}.tmp-{}", CURRENT_FILE, std::process::id()))
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Read an artifact; absent or unreadable both count as missing.
fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        debug!(path = %path.display(), error = %e, "index artifact unavailable");
        RagError::MissingIndexArtifact(path.to_path_buf())
    })
}

/// Highest generation number under `dir`, finished or not.
fn last_generation(dir: &Path) -> Result<u64> {
    let mut last = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(seq) = entry.file_name().to_str().and_then(generation_seq) {
            last = last.max(seq);
        }
    }
    Ok(last)
}

/// Name of the live generation.
fn read_current(dir: &Path) -> Result<String> {
    let bytes = read_artifact(&dir.join(CURRENT_FILE))?;
    let name = String::from_utf8_lossy(&bytes).trim().to_string();
    if generation_seq(&name).is_none() {
        return Err(RagError::CorruptIndexStore(format!(
            "{} names {:?}, which is not a generation",
            CURRENT_FILE, name
        )));
    }
    Ok(name)
}

/// Directory of the live generation.
pub fn current_generation(dir: &Path) -> Result<PathBuf> {
    Ok(dir.join(read_current(dir)?))
}

fn point_current(dir: &Path, name: &str) -> Result<()> {
    let tmp = pointer_tmp(dir);
    write_synced(&tmp, name.as_bytes())?;
    std::fs::rename(&tmp, dir.join(CURRENT_FILE)).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        RagError::from(e)
    })
}

/// Remove generations other than `keep` and leftover pointer temp files.
/// The new store is already live, so failures are only logged.
fn prune(dir: &Path, keep: &[&str]) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list index dir for pruning");
            return;
        }
    };
    let tmp_prefix = format!("{}.tmp-", CURRENT_FILE);

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let stale = match generation_seq(&name) {
            Some(_) => !keep.contains(&name.as_str()),
            None => name.starts_with(&tmp_prefix),
        };
        if !stale {
            continue;
        }

        let path = entry.path();
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match removed {
            Ok(()) => debug!(path = %path.display(), "pruned stale index entry"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to prune stale index entry"),
        }
    }
}

impl IndexStore {
    /// Persist into `dir` as a new generation and make it the live one.
    ///
    /// On error the previous store stays live and the partial generation is
    /// removed.
    pub fn save(&self, dir: &Path) -> Result<Manifest> {
        std::fs::create_dir_all(dir)?;
        let previous = read_current(dir).ok();
        let name = generation_name(last_generation(dir)? + 1);
        let generation = dir.join(&name);
        std::fs::create_dir(&generation)?;

        let written = self
            .write_generation(&generation)
            .and_then(|manifest| point_current(dir, &name).map(|()| manifest));
        let manifest = match written {
            Ok(manifest) => manifest,
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_dir_all(&generation) {
                    warn!(
                        path = %generation.display(),
                        error = %cleanup,
                        "failed to remove unfinished index generation"
                    );
                }
                return Err(e);
            }
        };

        let mut keep = vec![name.as_str()];
        if let Some(previous) = previous.as_deref() {
            keep.push(previous);
        }
        prune(dir, &keep);

        info!(
            dir = %dir.display(),
            generation = %name,
            count = manifest.count,
            dimension = manifest.encoder.dimension,
            "index store saved"
        );
        Ok(manifest)
    }

    fn write_generation(&self, generation: &Path) -> Result<Manifest> {
        let vectors = self.index().to_bytes();
        let metadata = serde_json::to_vec(self.all_metadata())?;
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            encoder: self.encoder().clone(),
            count: self.len(),
            vectors_blake3: blake3::hash(&vectors).to_hex().to_string(),
            metadata_blake3: blake3::hash(&metadata).to_hex().to_string(),
            built_at: self.built_at(),
        };

        write_synced(&generation.join(VECTORS_FILE), &vectors)?;
        write_synced(&generation.join(METADATA_FILE), &metadata)?;
        write_synced(
            &generation.join(MANIFEST_FILE),
            &serde_json::to_vec_pretty(&manifest)?,
        )?;
        Ok(manifest)
    }

    /// Load the live generation or fail. Never returns a partial store.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut name = read_current(dir)?;
        let mut attempts = 1;
        loop {
            match Self::load_generation(&dir.join(&name)) {
                Err(RagError::MissingIndexArtifact(path)) if attempts < LOAD_ATTEMPTS => {
                    // Pruned by a save that landed after CURRENT was read.
                    let latest = read_current(dir)?;
                    if latest == name {
                        return Err(RagError::MissingIndexArtifact(path));
                    }
                    debug!(from = %name, to = %latest, "index generation replaced during load");
                    name = latest;
                    attempts += 1;
                }
                other => return other,
            }
        }
    }

    fn load_generation(generation: &Path) -> Result<Self> {
        let manifest_bytes = read_artifact(&generation.join(MANIFEST_FILE))?;
        let vector_bytes = read_artifact(&generation.join(VECTORS_FILE))?;
        let metadata_bytes = read_artifact(&generation.join(METADATA_FILE))?;

        let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| RagError::CorruptIndexStore(format!("unreadable manifest: {}", e)))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(RagError::CorruptIndexStore(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }
        if blake3::hash(&vector_bytes).to_hex().as_str() != manifest.vectors_blake3 {
            return Err(RagError::CorruptIndexStore(
                "vector artifact does not match manifest checksum".to_string(),
            ));
        }
        if blake3::hash(&metadata_bytes).to_hex().as_str() != manifest.metadata_blake3 {
            return Err(RagError::CorruptIndexStore(
                "metadata artifact does not match manifest checksum".to_string(),
            ));
        }

        let index = FlatL2Index::from_bytes(&vector_bytes)?;
        let metadata: Vec<ChunkMeta> = serde_json::from_slice(&metadata_bytes)
            .map_err(|e| RagError::CorruptIndexStore(format!("unreadable metadata: {}", e)))?;

        if index.len() != manifest.count || metadata.len() != manifest.count {
            return Err(RagError::CorruptIndexStore(format!(
                "manifest records {} entries, found {} vectors and {} metadata records",
                manifest.count,
                index.len(),
                metadata.len()
            )));
        }

        let store = IndexStore::from_parts(index, metadata, manifest.encoder, manifest.built_at)?;
        info!(
            generation = %generation.display(),
            count = store.len(),
            dimension = store.dimension(),
            model = %store.encoder().model,
            "index store loaded"
        );
        Ok(store)
    }
}

/// Read only the live manifest, e.g. for `info`.
pub fn read_manifest(dir: &Path) -> Result<Manifest> {
    let bytes = read_artifact(&current_generation(dir)?.join(MANIFEST_FILE))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| RagError::CorruptIndexStore(format!("unreadable manifest: {}", e)))
}
