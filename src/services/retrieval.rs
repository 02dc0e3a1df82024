use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{RagchatError, Result};
use crate::ingest::chunker::Chunk;
use super::{RerankedDoc, RetrievalService, RetrievedDoc};

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<RetrievedDoc>,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: &'a [String],
    k: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankedDoc>,
}

#[derive(Serialize)]
struct IndexRequest<'a> {
    chunks: &'a [Chunk],
}

/// HTTP client for the external retrieval/index service
pub struct HttpRetrievalClient {
    client: Client,
    endpoint: String,
}

impl HttpRetrievalClient {
    /// Create a client against `endpoint` (e.g. `http://localhost:8088`)
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// normal operation)
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        request: &Req,
    ) -> Result<Resp> {
        let response = self
            .client
            .post(format!("{}{}", self.endpoint, path))
            .json(request)
            .send()
            .await
            .map_err(|e| RagchatError::Retrieval(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(RagchatError::Retrieval(format!(
                "Retrieval service error {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RagchatError::Retrieval(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl RetrievalService for HttpRetrievalClient {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedDoc>> {
        let response: SearchResponse = self
            .post_json("/search", &SearchRequest { query, k })
            .await?;
        Ok(response.results)
    }

    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        k: usize,
    ) -> Result<Vec<RerankedDoc>> {
        let response: RerankResponse = self
            .post_json("/rerank", &RerankRequest { query, documents, k })
            .await?;
        Ok(response.results)
    }

    async fn index(&self, chunks: &[Chunk]) -> Result<()> {
        // The index endpoint acknowledges with a status only
        let response = self
            .client
            .post(format!("{}/index", self.endpoint))
            .json(&IndexRequest { chunks })
            .send()
            .await
            .map_err(|e| RagchatError::Retrieval(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(RagchatError::Retrieval(format!(
                "Retrieval service error {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let client = HttpRetrievalClient::new("http://localhost:8088/");
        assert_eq!(client.endpoint, "http://localhost:8088");
    }

    #[test]
    fn test_search_response_deserializes_metadata() {
        let raw = r#"{
            "results": [
                {"content": "chunk text", "document_metadata": {"source": "a.md", "tags": ["alpha"], "urls": []}},
                {"content": "bare chunk"}
            ]
        }"#;
        let response: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.results.len(), 2);
        let meta = response.results[0].document_metadata.as_ref().unwrap();
        assert!(meta.tags.contains("alpha"));
        assert!(response.results[1].document_metadata.is_none());
    }
}
