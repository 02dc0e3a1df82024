use anyhow::Result;
use clap::Parser;
use ragchat::chat::QueryOrchestrator;
use ragchat::eval::{average_f1, evaluate_pairs, generate_qa_pairs};
use ragchat::ingest::process_documents;
use ragchat::services::{HttpRetrievalClient, OllamaClient, RetrievalService};
use ragchat::tokens::CharTokenEstimator;
use ragchat::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "eval")]
#[command(about = "Score retrieval-augmented answers against generated question/answer pairs")]
struct Args {
    /// Directory path containing documents to process
    #[arg(long)]
    data: Option<PathBuf>,

    /// Number of question/answer pairs to generate
    #[arg(long, default_value_t = 10)]
    qa_pairs: usize,

    /// Generation service URL (e.g. https://1.2.3.4:11434)
    #[arg(long)]
    client: Option<String>,

    /// Retrieval service URL
    #[arg(long)]
    retrieval: Option<String>,

    /// Evaluate against the already-populated index instead of re-indexing
    #[arg(long)]
    skip_index: bool,

    /// Where to write the generated evaluation dataset
    #[arg(long, default_value = "evaluation_dataset.json")]
    dataset: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info"))
        .init();

    let args = Args::parse();
    let config = Config::load()?;

    let directory = args.data.unwrap_or_else(|| config.ingest.data_dir.clone());
    let generation_endpoint = args
        .client
        .unwrap_or_else(|| config.generation.endpoint.clone());
    let retrieval_endpoint = args
        .retrieval
        .unwrap_or_else(|| config.retrieval.endpoint.clone());

    log::info!("Using directory: {}", directory.display());
    log::info!("Model: {}", config.generation.model);

    let generation = OllamaClient::new(generation_endpoint);
    let retrieval = HttpRetrievalClient::new(retrieval_endpoint);

    let outcome = process_documents(
        &directory,
        None,
        config.ingest.chunk_size,
        config.ingest.chunk_overlap,
    )
    .await?;

    log::info!("Number of unique files processed: {}", outcome.processed);
    log::info!("Number of duplicate files skipped: {}", outcome.duplicates);
    log::info!("Chunks produced: {}", outcome.chunks.len());

    if !args.skip_index && !outcome.chunks.is_empty() {
        // Indexing failures are reported but do not fail the run; evaluation
        // then scores against whatever the index already holds.
        if let Err(e) = retrieval.index(&outcome.chunks).await {
            log::error!("Error during indexing: {}", e);
        }
    }

    log::info!("Generating question/answer pairs...");
    let contents: Vec<&str> = outcome.chunks.iter().map(|c| c.content.as_str()).collect();
    let pairs = generate_qa_pairs(
        &generation,
        &config.generation.model,
        &contents,
        args.qa_pairs,
    )
    .await;

    if pairs.is_empty() {
        log::warn!("No question/answer pairs could be generated");
        return Ok(());
    }
    std::fs::write(&args.dataset, serde_json::to_string_pretty(&pairs)?)?;
    log::info!(
        "Generated {} QA pairs for evaluation (written to {})",
        pairs.len(),
        args.dataset.display()
    );

    let estimator = CharTokenEstimator;
    let orchestrator = QueryOrchestrator::new(
        &retrieval,
        &generation,
        &estimator,
        config.generation.model.clone(),
        config.budget(),
        config.retrieval.top_k,
        config.retrieval.rerank_k,
    );

    log::info!("Evaluating the retrieval pipeline...");
    let results = evaluate_pairs(&orchestrator, &pairs).await;

    for result in &results {
        println!("Query: {}", result.query);
        println!("Ground Truth: {}", result.ground_truth);
        println!("Generated Answer: {}", result.generated_answer);
        println!(
            "Token F1: {:.4} (precision {:.4}, recall {:.4})",
            result.score.f1, result.score.precision, result.score.recall
        );
        println!(
            "rag: {:.4} s | generation: {:.4} s\n",
            result.retrieval_ms as f64 / 1000.0,
            result.generation_ms as f64 / 1000.0
        );
    }
    println!("Average token F1: {:.4}", average_f1(&results));

    Ok(())
}
