use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: PathBuf,
    /// Uploads above this size are rejected with SizeExceeded.
    #[serde(default = "default_max_document_size")]
    pub max_document_size: u64,
    /// Chunks per persisted batch key. Exists solely to respect a per-key
    /// size ceiling in the blob store.
    #[serde(default = "default_chunks_per_batch")]
    pub chunks_per_batch: usize,
    /// How much document content to keep in the persisted record.
    #[serde(default = "default_content_keep_chars")]
    pub content_keep_chars: usize,
}

fn default_max_document_size() -> u64 {
    5_000_000
}
fn default_chunks_per_batch() -> usize {
    50
}
fn default_content_keep_chars() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Documents longer than this switch to `large_chunk_size` to bound
    /// total chunk count.
    #[serde(default = "default_large_doc_threshold")]
    pub large_doc_threshold: usize,
    #[serde(default = "default_large_chunk_size")]
    pub large_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            large_doc_threshold: default_large_doc_threshold(),
            large_chunk_size: default_large_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_large_doc_threshold() -> usize {
    100_000
}
fn default_large_chunk_size() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Embedding vector dimensionality for the hashed bag-of-words model.
    #[serde(default = "default_dims")]
    pub dims: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dims: default_dims(),
        }
    }
}

fn default_dims() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Default result count when the caller doesn't specify one.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Extra candidates fetched before the multi-document collapse step.
    #[serde(default = "default_candidate_extra")]
    pub candidate_extra: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            candidate_extra: default_candidate_extra(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_candidate_extra() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7431".to_string()
}

impl Config {
    /// A minimal configuration for programmatic and test use.
    pub fn minimal() -> Self {
        Self {
            storage: StorageConfig {
                path: PathBuf::from("./data/docrag.sqlite"),
                max_document_size: default_max_document_size(),
                chunks_per_batch: default_chunks_per_batch(),
                content_keep_chars: default_content_keep_chars(),
            },
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }
    if config.chunking.large_chunk_size < config.chunking.chunk_size {
        anyhow::bail!("chunking.large_chunk_size must be >= chunking.chunk_size");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.storage.chunks_per_batch == 0 {
        anyhow::bail!("storage.chunks_per_batch must be >= 1");
    }

    Ok(config)
}
