use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{RagchatError, Result};
use super::GenerationService;

/// Request structure for the Ollama generate API
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Response structure from the Ollama generate API
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama generation client.
///
/// Talks to a local daemon by default; an operator-supplied remote URL works
/// the same way.
pub struct OllamaClient {
    client: Client,
    endpoint: String,
}

impl OllamaClient {
    /// Create a client against `endpoint` (e.g. `http://localhost:11434`)
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// normal operation)
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = Client::builder()
            // Generation on local hardware can be slow
            .timeout(Duration::from_secs(600))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GenerationService for OllamaClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagchatError::Generation(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(RagchatError::Generation(format!(
                "Ollama API error {}: {}",
                status, body
            )));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RagchatError::Generation(format!("Failed to parse response: {}", e)))?;

        Ok(result.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.endpoint, "http://localhost:11434");
    }

    #[test]
    fn test_generate_request_serialization() {
        let request = GenerateRequest {
            model: "mistral-nemo",
            prompt: "hello",
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "mistral-nemo");
        assert_eq!(json["stream"], false);
    }
}
