use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{RagchatError, Result};
use super::metadata::GeneratedMetadata;
use super::walker::is_supported_extension;

/// Named, typed document metadata.
///
/// `source` and `filepath` are attached at load time; the descriptive fields
/// come from a `.meta` sidecar or from metadata generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub filepath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub urls: BTreeSet<String>,
}

impl DocumentMetadata {
    /// Merge generated metadata into this record, replacing the descriptive
    /// fields.
    pub fn apply(&mut self, generated: &GeneratedMetadata) {
        self.title = Some(generated.title.clone());
        self.slug = Some(generated.slug.clone());
        self.desc = Some(generated.desc.clone());
        self.tags = generated.tags.iter().cloned().collect();
        self.urls = generated.urls.iter().cloned().collect();
    }
}

/// A loaded source document, produced once per admitted file
#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// Load a single document from disk.
///
/// Text and code files are read verbatim; PDFs go through text extraction.
/// Any co-located `.meta` sidecar is merged into the document metadata.
pub fn load_document(path: &Path) -> Result<Document> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    if !is_supported_extension(&extension) {
        return Err(RagchatError::InvalidInput(format!(
            "Unsupported file type: .{}",
            extension
        )));
    }

    let content = if extension == "pdf" {
        pdf_extract::extract_text(path).map_err(|e| {
            RagchatError::Extraction(format!("{}: {}", path.display(), e))
        })?
    } else {
        std::fs::read_to_string(path)?
    };

    let filepath = path
        .canonicalize()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| path.display().to_string());

    let mut metadata = DocumentMetadata {
        source: path.display().to_string(),
        filepath,
        ..Default::default()
    };

    if let Some(sidecar) = load_sidecar(path)? {
        metadata.apply(&sidecar);
    }

    Ok(Document { content, metadata })
}

/// Path of the metadata sidecar co-located with `source_path`
/// (`docs/guide.md` → `docs/guide.meta`)
pub fn sidecar_path(source_path: &Path) -> PathBuf {
    source_path.with_extension("meta")
}

/// Read and parse the `.meta` sidecar for `source_path`, if one exists
pub fn load_sidecar(source_path: &Path) -> Result<Option<GeneratedMetadata>> {
    let meta_path = sidecar_path(source_path);
    if !meta_path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&meta_path)?;
    let metadata = serde_json::from_str(&raw)
        .map_err(|e| RagchatError::Parse(format!("{}: {}", meta_path.display(), e)))?;
    Ok(Some(metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_text_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, "hello world").unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.content, "hello world");
        assert_eq!(doc.metadata.source, path.display().to_string());
        assert!(doc.metadata.filepath.ends_with("a.txt"));
        assert!(doc.metadata.title.is_none());
    }

    #[test]
    fn test_load_unsupported_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blob.bin");
        fs::write(&path, "data").unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, RagchatError::InvalidInput(_)));
        assert!(err.to_string().contains(".bin"));
    }

    #[test]
    fn test_load_merges_sidecar() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("guide.md");
        fs::write(&path, "# Guide").unwrap();
        fs::write(
            temp_dir.path().join("guide.meta"),
            r#"{"title":"Guide","slug":"short","desc":"A guide.","tags":["howto"],"urls":["https://example.com"]}"#,
        )
        .unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.metadata.title.as_deref(), Some("Guide"));
        assert_eq!(doc.metadata.slug.as_deref(), Some("short"));
        assert!(doc.metadata.tags.contains("howto"));
        assert!(doc.metadata.urls.contains("https://example.com"));
    }

    #[test]
    fn test_malformed_sidecar_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("guide.md");
        fs::write(&path, "# Guide").unwrap();
        fs::write(temp_dir.path().join("guide.meta"), "{not json").unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, RagchatError::Parse(_)));
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("docs/guide.md")),
            PathBuf::from("docs/guide.meta")
        );
    }
}
