use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::chat::TokenBudget;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Generation service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Model name passed to the generation service
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of the generation service
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,
    /// Maximum context window in estimated tokens; should match the
    /// serving configuration of the model
    #[serde(default = "default_max_context")]
    pub max_context: usize,
    /// Safety margin subtracted from the context window
    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

/// Retrieval service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Base URL of the retrieval/index service
    #[serde(default = "default_retrieval_endpoint")]
    pub endpoint: String,
    /// Number of documents fetched by the initial search
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Number of documents kept after reranking
    #[serde(default = "default_rerank_k")]
    pub rerank_k: usize,
}

/// Ingestion configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Default directory of documents to ingest
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters repeated between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Attempt bound for structured metadata generation
    #[serde(default = "default_metadata_max_retries")]
    pub metadata_max_retries: usize,
    /// Characters of document content embedded in the metadata prompt
    #[serde(default = "default_metadata_preview_chars")]
    pub metadata_preview_chars: usize,
}

fn default_model() -> String {
    "mistral-nemo".to_string()
}

fn default_generation_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_max_context() -> usize {
    2000
}

fn default_buffer() -> usize {
    100
}

fn default_retrieval_endpoint() -> String {
    "http://localhost:8088".to_string()
}

fn default_top_k() -> usize {
    20
}

fn default_rerank_k() -> usize {
    5
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/")
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    0
}

fn default_metadata_max_retries() -> usize {
    4
}

fn default_metadata_preview_chars() -> usize {
    1200
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_generation_endpoint(),
            max_context: default_max_context(),
            buffer: default_buffer(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: default_retrieval_endpoint(),
            top_k: default_top_k(),
            rerank_k: default_rerank_k(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            metadata_max_retries: default_metadata_max_retries(),
            metadata_preview_chars: default_metadata_preview_chars(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Loads environment variables from .env file (if present) first.
    /// Looks for the config file in this order:
    /// 1. Path specified in the RAGCHAT_CONFIG environment variable
    /// 2. ./config.toml in the current directory
    ///
    /// A missing config file falls back to built-in defaults, but an
    /// explicitly configured path that cannot be read is an error.
    /// After loading, the OLLAMA_MODEL and MAX_CONTEXT environment variables
    /// override the corresponding generation settings.
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let explicit = std::env::var("RAGCHAT_CONFIG").ok();
        let config_path = explicit
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"));

        let mut config: Config = if config_path.exists() {
            let config_str = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
            toml::from_str(&config_str)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else if explicit.is_some() {
            anyhow::bail!("Config file does not exist: {}", config_path.display());
        } else {
            log::debug!("No config.toml found, using built-in defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides for the generation settings
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            if !model.trim().is_empty() {
                self.generation.model = model;
            }
        }
        if let Ok(max_context) = std::env::var("MAX_CONTEXT") {
            self.generation.max_context = max_context
                .trim()
                .parse()
                .with_context(|| format!("MAX_CONTEXT is not a valid integer: {}", max_context))?;
        }
        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.ingest.chunk_size == 0 {
            anyhow::bail!("ingest.chunk_size must be greater than 0");
        }

        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            anyhow::bail!("ingest.chunk_overlap must be less than chunk_size");
        }

        if self.ingest.metadata_max_retries == 0 {
            anyhow::bail!("ingest.metadata_max_retries must be greater than 0");
        }

        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be greater than 0");
        }

        if self.retrieval.rerank_k == 0 || self.retrieval.rerank_k > self.retrieval.top_k {
            anyhow::bail!("retrieval.rerank_k must be between 1 and top_k");
        }

        if self.generation.buffer >= self.generation.max_context {
            anyhow::bail!("generation.buffer must be less than max_context");
        }

        Ok(())
    }

    /// Token budget for prompt assembly
    pub fn budget(&self) -> TokenBudget {
        TokenBudget {
            max_context: self.generation.max_context,
            buffer: self.generation.buffer,
        }
    }
}
