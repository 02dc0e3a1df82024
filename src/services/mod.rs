pub mod ollama;
pub mod retrieval;

pub use ollama::OllamaClient;
pub use retrieval::HttpRetrievalClient;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::ingest::loader::DocumentMetadata;
use crate::ingest::chunker::Chunk;

/// A document returned by the initial retrieval search
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievedDoc {
    pub content: String,
    #[serde(default)]
    pub document_metadata: Option<DocumentMetadata>,
}

/// A document returned by the rerank pass
#[derive(Debug, Clone, Deserialize)]
pub struct RerankedDoc {
    pub content: String,
}

/// Text-generation service boundary.
///
/// Behaves as a synchronous RPC: one blocking call, no client-side
/// cancellation.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generate a completion for `prompt` using `model`
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;
}

/// Retrieval/index service boundary.
///
/// Embedding, similarity search, and reranking internals are opaque; only
/// the ranked document lists cross this interface.
#[async_trait]
pub trait RetrievalService: Send + Sync {
    /// Initial ranked search over the index
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedDoc>>;

    /// Second-pass reordering of `documents` to a smaller, more relevant set
    async fn rerank(&self, query: &str, documents: &[String], k: usize)
        -> Result<Vec<RerankedDoc>>;

    /// Hand the final chunk records to the index
    async fn index(&self, chunks: &[Chunk]) -> Result<()>;
}
