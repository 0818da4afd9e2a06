use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tracing::info;

use crate::docs::chunker::{ChunkConfig, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use crate::embed::{Encoder, HttpEncoder};
use crate::index::builder::BuildOptions;
use crate::index::IndexStore;
use crate::llm::LlmClient;
use crate::rag::prompts::Persona;
use crate::rag::retriever::Retriever;
use crate::rag::RagEngine;

/// Embedding endpoint settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimensions: Option<usize>,
}

impl EncoderConfig {
    pub fn connect(&self, timeout: Duration) -> anyhow::Result<HttpEncoder> {
        HttpEncoder::new(
            self.base_url.clone(),
            self.model.clone(),
            self.dimensions,
            self.api_key.clone(),
            timeout,
        )
    }
}

/// Runtime settings read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct RagConfig {
    pub index_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub embed_batch: usize,
    pub query_timeout: Duration,
    pub persona: Persona,
    pub encoder: EncoderConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("./data/index"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_OVERLAP,
            top_k: 5,
            embed_batch: BuildOptions::default().batch_size,
            query_timeout: Duration::from_secs(60),
            persona: Persona::default(),
            encoder: EncoderConfig {
                base_url: "http://localhost:1234/v1".to_string(),
                model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
                api_key: None,
                dimensions: None,
            },
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid {}={:?}: {}", key, raw, e)),
        None => Ok(None),
    }
}

impl RagConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            index_dir: text("RAG_INDEX_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.index_dir),
            chunk_size: parsed(&lookup, "RAG_CHUNK_SIZE")?.unwrap_or(defaults.chunk_size),
            chunk_overlap: parsed(&lookup, "RAG_CHUNK_OVERLAP")?
                .unwrap_or(defaults.chunk_overlap),
            top_k: parsed(&lookup, "RAG_TOP_K")?.unwrap_or(defaults.top_k),
            embed_batch: parsed(&lookup, "RAG_EMBED_BATCH")?.unwrap_or(defaults.embed_batch),
            query_timeout: parsed(&lookup, "RAG_QUERY_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.query_timeout),
            persona: Persona {
                assistant_name: text("RAG_ASSISTANT_NAME")
                    .unwrap_or(defaults.persona.assistant_name),
                corpus_description: text("RAG_CORPUS_DESCRIPTION")
                    .unwrap_or(defaults.persona.corpus_description),
            },
            encoder: EncoderConfig {
                base_url: text("EMBED_BASE_URL").unwrap_or(defaults.encoder.base_url),
                model: text("EMBED_MODEL").unwrap_or(defaults.encoder.model),
                api_key: text("EMBED_API_KEY"),
                dimensions: parsed(&lookup, "EMBED_DIMENSIONS")?,
            },
        };

        anyhow::ensure!(config.top_k > 0, "RAG_TOP_K must be at least 1");
        anyhow::ensure!(config.embed_batch > 0, "RAG_EMBED_BATCH must be at least 1");
        Ok(config)
    }

    pub fn chunk_config(&self) -> anyhow::Result<ChunkConfig> {
        Ok(ChunkConfig::new(self.chunk_size, self.chunk_overlap)?)
    }
}

/// Everything a query needs, loaded once at startup.
pub struct AppState {
    pub store: Arc<IndexStore>,
    pub engine: RagEngine,
}

/// Load the store off the async runtime.
pub async fn load_store(dir: &Path) -> anyhow::Result<IndexStore> {
    let dir = dir.to_path_buf();
    let display = dir.display().to_string();
    tokio::task::spawn_blocking(move || IndexStore::load(&dir))
        .await
        .context("index loading task panicked")?
        .with_context(|| format!("failed to load index store from {}", display))
}

impl AppState {
    /// Load the index and wire the query path. Fails when the store is
    /// missing or corrupt, or was built with a different encoder.
    pub async fn load(config: &RagConfig, index_dir: &Path) -> anyhow::Result<Self> {
        let store = Arc::new(load_store(index_dir).await?);

        let encoder = config.encoder.connect(config.query_timeout)?;
        store.verify_encoder(encoder.model(), encoder.dimension())?;
        info!(
            model = encoder.model(),
            chunks = store.len(),
            "encoder matches index"
        );

        let generator = LlmClient::from_env(config.persona.system_prompt())?;
        info!(model = generator.model(), "LLM client initialized");

        let retriever = Retriever::new(store.clone(), Arc::new(encoder));
        let engine = RagEngine::new(
            retriever,
            Arc::new(generator),
            config.persona.clone(),
            config.query_timeout,
        );
        Ok(Self { store, engine })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = RagConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, RagConfig::default());
        assert_eq!(config.chunk_size, 400);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.query_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = RagConfig::from_lookup(lookup_from(&[
            ("RAG_INDEX_DIR", "/srv/index"),
            ("RAG_CHUNK_SIZE", "200"),
            ("RAG_CHUNK_OVERLAP", "20"),
            ("RAG_TOP_K", "3"),
            ("RAG_QUERY_TIMEOUT_SECS", "15"),
            ("RAG_ASSISTANT_NAME", "Docs Helper"),
            ("EMBED_MODEL", "nomic-embed-text"),
            ("EMBED_DIMENSIONS", "768"),
            ("EMBED_API_KEY", " "),
        ]))
        .unwrap();

        assert_eq!(config.index_dir, PathBuf::from("/srv/index"));
        assert_eq!(config.chunk_size, 200);
        assert_eq!(config.chunk_overlap, 20);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.query_timeout, Duration::from_secs(15));
        assert_eq!(config.persona.assistant_name, "Docs Helper");
        assert_eq!(
            config.persona.corpus_description,
            Persona::default().corpus_description
        );
        assert_eq!(config.encoder.model, "nomic-embed-text");
        assert_eq!(config.encoder.dimensions, Some(768));
        assert_eq!(config.encoder.api_key, None);
    }

    #[test]
    fn test_bad_numbers_are_rejected() {
        assert!(RagConfig::from_lookup(lookup_from(&[("RAG_TOP_K", "many")])).is_err());
        assert!(RagConfig::from_lookup(lookup_from(&[("RAG_TOP_K", "0")])).is_err());
        assert!(RagConfig::from_lookup(lookup_from(&[("EMBED_DIMENSIONS", "-1")])).is_err());
    }

    #[test]
    fn test_chunk_config_validates_overlap() {
        let config = RagConfig::from_lookup(lookup_from(&[
            ("RAG_CHUNK_SIZE", "50"),
            ("RAG_CHUNK_OVERLAP", "50"),
        ]))
        .unwrap();
        assert!(config.chunk_config().is_err());
    }

    #[tokio::test]
    async fn test_load_missing_index_fails() {
        let dir = crate::testing::scratch_dir("state_missing").join("index");
        let err = load_store(&dir).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::RagError>(),
            Some(crate::error::RagError::MissingIndexArtifact(_))
        ));
    }
}
