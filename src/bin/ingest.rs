use anyhow::Result;
use clap::Parser;
use ragchat::ingest::{process_documents, MetadataGenerator};
use ragchat::services::{HttpRetrievalClient, OllamaClient, RetrievalService};
use ragchat::Config;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Process and index documents for retrieval-augmented chat")]
struct Args {
    /// Directory path containing documents to process
    #[arg(long)]
    data: Option<PathBuf>,

    /// Generate or regenerate metadata for documents
    #[arg(long)]
    metadata_enabled: bool,

    /// Chunk size in characters
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Characters of overlap between consecutive chunks
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Generation service URL (used for metadata generation)
    #[arg(long)]
    client: Option<String>,

    /// Process and chunk without handing the result to the index service
    #[arg(long)]
    skip_index: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info"))
        .init();

    let args = Args::parse();
    let config = Config::load()?;

    let directory = args.data.unwrap_or_else(|| config.ingest.data_dir.clone());
    let chunk_size = args.chunk_size.unwrap_or(config.ingest.chunk_size);
    let chunk_overlap = args.chunk_overlap.unwrap_or(config.ingest.chunk_overlap);

    log::info!("Using directory: {}", directory.display());
    log::info!("Generate metadata: {}", args.metadata_enabled);

    let generation_endpoint = args
        .client
        .unwrap_or_else(|| config.generation.endpoint.clone());
    let generation = OllamaClient::new(generation_endpoint);

    let generator = if args.metadata_enabled {
        Some(
            MetadataGenerator::new(&generation, config.generation.model.clone()).with_limits(
                config.ingest.metadata_max_retries,
                config.ingest.metadata_preview_chars,
            ),
        )
    } else {
        None
    };

    // Directory validation happens before any chunking or indexing; a bad
    // root aborts the run here.
    let outcome =
        process_documents(&directory, generator.as_ref(), chunk_size, chunk_overlap).await?;

    let total_files = outcome.processed + outcome.duplicates;
    let processing_secs = outcome.elapsed.as_secs_f64();
    log::info!("Number of unique files processed: {}", outcome.processed);
    log::info!("Number of duplicate files skipped: {}", outcome.duplicates);
    log::info!("Total processing time: {:.2} seconds", processing_secs);
    if total_files > 0 {
        log::info!(
            "Average time per file: {:.2} seconds",
            processing_secs / total_files as f64
        );
    }
    log::info!("Chunks produced: {}", outcome.chunks.len());

    if args.skip_index {
        log::info!("Skipping index hand-off (--skip-index)");
        return Ok(());
    }
    if outcome.chunks.is_empty() {
        log::warn!("No chunks to index");
        return Ok(());
    }

    let retrieval = HttpRetrievalClient::new(config.retrieval.endpoint.clone());
    let indexing_start = Instant::now();

    // Indexing-time failures are reported but do not fail the run; the
    // processed corpus and sidecars remain valid on disk.
    match retrieval.index(&outcome.chunks).await {
        Ok(()) => {
            let indexing_secs = indexing_start.elapsed().as_secs_f64();
            log::info!("Indexing time: {:.2} seconds", indexing_secs);
            if outcome.processed > 0 {
                log::info!(
                    "Average time per unique document: {:.2} seconds",
                    indexing_secs / outcome.processed as f64
                );
            }
            let total_secs = processing_secs + indexing_secs;
            log::info!("Total ingestion time: {:.2} seconds", total_secs);
            if total_files > 0 {
                log::info!(
                    "Average time per original document: {:.2} seconds",
                    total_secs / total_files as f64
                );
            }
        }
        Err(e) => log::error!("Error during indexing: {}", e),
    }

    Ok(())
}
