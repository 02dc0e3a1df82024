pub mod chunker;
pub mod dedup;
pub mod loader;
pub mod metadata;
pub mod walker;

pub use chunker::{chunk_document, Chunk, Language};
pub use dedup::{content_digest, ContentDeduplicator};
pub use loader::{load_document, Document, DocumentMetadata};
pub use metadata::{GeneratedMetadata, MetadataGenerator};
pub use walker::{discover_files, SourceFile, SUPPORTED_EXTENSIONS};

use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::{RagchatError, Result};

/// Result of one ingestion run
#[derive(Debug)]
pub struct IngestOutcome {
    /// Chunk records for the retrieval/index service
    pub chunks: Vec<Chunk>,
    /// Unique documents admitted
    pub processed: usize,
    /// Byte-identical documents skipped
    pub duplicates: usize,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

/// Validate the ingestion root before any work starts.
///
/// A missing, non-directory, or empty path is a fatal startup condition.
pub fn check_directory(directory: &Path) -> Result<()> {
    if !directory.exists() {
        return Err(RagchatError::Config(format!(
            "The specified directory does not exist: {}",
            directory.display()
        )));
    }
    if !directory.is_dir() {
        return Err(RagchatError::Config(format!(
            "The specified path is not a directory: {}",
            directory.display()
        )));
    }
    if std::fs::read_dir(directory)?.next().is_none() {
        return Err(RagchatError::Config(format!(
            "The specified directory is empty: {}",
            directory.display()
        )));
    }
    Ok(())
}

/// Walk `directory`, load every supported file, dedup by content, optionally
/// generate metadata, and chunk the admitted documents.
///
/// Per-file load errors are logged and skipped; they never abort the walk.
pub async fn process_documents(
    directory: &Path,
    metadata_generator: Option<&MetadataGenerator<'_>>,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<IngestOutcome> {
    check_directory(directory)?;

    log::info!("Processing documents in {}", directory.display());
    let start = Instant::now();

    let files = discover_files(directory)?;
    let mut deduplicator = ContentDeduplicator::new();
    let mut documents = Vec::new();
    let mut processed = 0;
    let mut duplicates = 0;

    for file in &files {
        let mut document = match load_document(&file.absolute_path) {
            Ok(doc) => doc,
            Err(e) => {
                log::error!("Error processing {}: {}", file.relative_path, e);
                continue;
            }
        };

        if !deduplicator.admit(&document.content) {
            duplicates += 1;
            log::info!("Duplicate found and skipped: {}", file.relative_path);
            continue;
        }

        if let Some(generator) = metadata_generator {
            log::info!("Generating metadata for {}", file.relative_path);
            if let Some(generated) = generator.generate(&document).await {
                if let Err(e) = metadata::write_sidecar(&file.absolute_path, &generated) {
                    log::error!(
                        "Failed to write metadata sidecar for {}: {}",
                        file.relative_path,
                        e
                    );
                }
                document.metadata.apply(&generated);
            }
        }

        processed += 1;
        documents.push(document);
    }

    // Split documents after all loads complete
    let mut chunks = Vec::new();
    for document in &documents {
        chunks.extend(chunk_document(document, chunk_size, chunk_overlap));
    }

    let elapsed = start.elapsed();
    log::info!(
        "Processed {} unique documents ({} duplicates skipped) into {} chunks in {:.2?}",
        processed,
        duplicates,
        chunks.len(),
        elapsed
    );

    Ok(IngestOutcome {
        chunks,
        processed,
        duplicates,
        elapsed,
    })
}
