use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{RagchatError, Result};
use crate::services::GenerationService;
use super::loader::{sidecar_path, Document};

/// Prompt template for structured metadata generation.
/// `{summary}` is replaced with a bounded prefix of the document content.
const METADATA_PROMPT_TEMPLATE: &str = r#"Based on the following document, generate a JSON object with the following fields:
1. title: Extract or generate a concise title for the document (string)
2. slug: Create a very short summary of just a few words (string)
3. desc: A 2-3 sentence description of overall content (string)
4. tags: Include a list of relevant tags to help categorize the content (array of strings)
5. urls: Include a list of any urls for reference (array of strings)

Ensure that the JSON object strictly follows this structure:
{
    "title": "string",
    "slug": "string",
    "desc": "string",
    "tags": ["string", "string", ...],
    "urls": ["string", "string", ...]
}

Document summary:
{summary}

Respond only with the valid JSON object, no additional text."#;

/// Structured metadata describing a source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMetadata {
    pub title: String,
    pub slug: String,
    pub desc: String,
    pub tags: Vec<String>,
    pub urls: Vec<String>,
}

/// Why a single generation attempt failed
#[derive(Debug)]
enum AttemptError {
    /// The generation service call itself failed
    Service(String),
    /// The response was not valid JSON after fence stripping
    Parse(String),
    /// The JSON did not conform to the metadata schema
    Schema(String),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Service(msg) => write!(f, "generation call failed: {}", msg),
            AttemptError::Parse(msg) => write!(f, "failed to parse JSON: {}", msg),
            AttemptError::Schema(msg) => write!(f, "schema mismatch: {}", msg),
        }
    }
}

/// Bounded-retry metadata generator.
///
/// Each attempt requests a JSON object from the generation service, strips
/// any markdown code fence, parses, and validates the schema. Attempts stop
/// at the first success or after `max_retries` failures; exhaustion yields
/// absence rather than an error so ingestion of the document continues.
pub struct MetadataGenerator<'a> {
    service: &'a dyn GenerationService,
    model: String,
    max_retries: usize,
    preview_chars: usize,
}

impl<'a> MetadataGenerator<'a> {
    pub fn new(service: &'a dyn GenerationService, model: impl Into<String>) -> Self {
        Self {
            service,
            model: model.into(),
            max_retries: 4,
            preview_chars: 1200,
        }
    }

    pub fn with_limits(mut self, max_retries: usize, preview_chars: usize) -> Self {
        self.max_retries = max_retries;
        self.preview_chars = preview_chars;
        self
    }

    /// Generate metadata for `document`, or `None` once all attempts fail
    pub async fn generate(&self, document: &Document) -> Option<GeneratedMetadata> {
        for attempt in 1..=self.max_retries {
            match self.attempt(document).await {
                Ok(metadata) => return Some(metadata),
                Err(e) => log::warn!(
                    "Attempt {}/{} for {}: {}",
                    attempt,
                    self.max_retries,
                    document.metadata.source,
                    e
                ),
            }
        }
        log::warn!(
            "All {} attempts failed. Unable to generate valid metadata for {}",
            self.max_retries,
            document.metadata.source
        );
        None
    }

    async fn attempt(&self, document: &Document) -> std::result::Result<GeneratedMetadata, AttemptError> {
        let summary = char_prefix(&document.content, self.preview_chars);
        let prompt = METADATA_PROMPT_TEMPLATE.replace("{summary}", summary);

        let response = self
            .service
            .generate(&self.model, &prompt)
            .await
            .map_err(|e| AttemptError::Service(e.to_string()))?;

        let body = strip_code_fences(&response);
        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| AttemptError::Parse(e.to_string()))?;

        validate_schema(&value)?;

        serde_json::from_value(value).map_err(|e| AttemptError::Schema(e.to_string()))
    }
}

fn validate_schema(value: &serde_json::Value) -> std::result::Result<(), AttemptError> {
    let object = value
        .as_object()
        .ok_or_else(|| AttemptError::Schema("response is not a JSON object".to_string()))?;

    for key in ["title", "slug", "desc", "tags", "urls"] {
        if !object.contains_key(key) {
            return Err(AttemptError::Schema(format!(
                "missing required field: {}",
                key
            )));
        }
    }

    for key in ["tags", "urls"] {
        if !object[key].is_array() {
            return Err(AttemptError::Schema(format!("'{}' must be a list", key)));
        }
    }

    Ok(())
}

/// Strip a markdown code fence (optionally labeled "json") wrapping `text`.
///
/// A lot of models can't resist the urge to put JSON in code blocks even
/// when prompted not to.
pub fn strip_code_fences(text: &str) -> String {
    static FENCE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("Invalid regex pattern")
    });
    match FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// First `n` characters of `text`, at a character boundary
fn char_prefix(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Persist generated metadata as a pretty-printed `.meta` sidecar next to
/// the source file
pub fn write_sidecar(source_path: &Path, metadata: &GeneratedMetadata) -> Result<()> {
    let path = sidecar_path(source_path);
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| RagchatError::Parse(e.to_string()))?;
    std::fs::write(&path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::loader::DocumentMetadata;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock generation service replaying a fixed sequence of responses
    struct ScriptedService {
        responses: Vec<String>,
        calls: AtomicUsize,
    }

    impl ScriptedService {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: responses.into_iter().map(String::from).collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationService for ScriptedService {
        async fn generate(&self, _model: &str, _prompt: &str) -> crate::error::Result<String> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .responses
                .get(idx)
                .or_else(|| self.responses.last())
                .cloned()
                .unwrap_or_default())
        }
    }

    fn test_document() -> Document {
        Document {
            content: "Sample document content for metadata generation.".to_string(),
            metadata: DocumentMetadata {
                source: "sample.txt".to_string(),
                filepath: "/abs/sample.txt".to_string(),
                ..Default::default()
            },
        }
    }

    const VALID_JSON: &str =
        r#"{"title":"T","slug":"s","desc":"d","tags":[],"urls":[]}"#;

    #[tokio::test]
    async fn test_success_on_first_attempt_with_fences() {
        let response = format!("```json\n{}\n```", VALID_JSON);
        let service = ScriptedService::new(vec![&response]);
        let generator = MetadataGenerator::new(&service, "test-model");

        let metadata = generator.generate(&test_document()).await.unwrap();
        assert_eq!(metadata.title, "T");
        assert_eq!(metadata.slug, "s");
        assert!(metadata.tags.is_empty());
        assert_eq!(service.call_count(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_none_within_bound() {
        let service = ScriptedService::new(vec!["this is not json"]);
        let generator = MetadataGenerator::new(&service, "test-model");

        let metadata = generator.generate(&test_document()).await;
        assert!(metadata.is_none());
        // Never issues more than max_retries generation calls
        assert_eq!(service.call_count(), 4);
    }

    #[tokio::test]
    async fn test_retries_until_valid_response() {
        let service = ScriptedService::new(vec![
            "garbage",
            r#"{"title":"T","slug":"s"}"#, // valid JSON, missing keys
            VALID_JSON,
        ]);
        let generator = MetadataGenerator::new(&service, "test-model");

        let metadata = generator.generate(&test_document()).await;
        assert!(metadata.is_some());
        assert_eq!(service.call_count(), 3);
    }

    #[tokio::test]
    async fn test_non_sequence_tags_rejected() {
        let service = ScriptedService::new(vec![
            r#"{"title":"T","slug":"s","desc":"d","tags":"not-a-list","urls":[]}"#,
        ]);
        let generator = MetadataGenerator::new(&service, "test-model").with_limits(2, 1200);

        let metadata = generator.generate(&test_document()).await;
        assert!(metadata.is_none());
        assert_eq!(service.call_count(), 2);
    }

    #[test]
    fn test_strip_code_fences_variants() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(
            strip_code_fences("Here you go:\n```json\n{\"a\":1}\n```\nEnjoy!"),
            "{\"a\":1}"
        );
    }

    #[test]
    fn test_char_prefix_multibyte_safe() {
        assert_eq!(char_prefix("日本語のテキスト", 3), "日本語");
        assert_eq!(char_prefix("short", 1200), "short");
    }

    #[test]
    fn test_write_sidecar_roundtrip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let source = temp_dir.path().join("doc.txt");
        std::fs::write(&source, "content").unwrap();

        let metadata = GeneratedMetadata {
            title: "T".to_string(),
            slug: "s".to_string(),
            desc: "d".to_string(),
            tags: vec!["tag".to_string()],
            urls: vec![],
        };
        write_sidecar(&source, &metadata).unwrap();

        let loaded = crate::ingest::loader::load_sidecar(&source).unwrap().unwrap();
        assert_eq!(loaded, metadata);
    }
}
