use anyhow::Result;
use clap::Parser;
use ragchat::chat::{ConversationHistory, QueryOrchestrator};
use ragchat::services::{HttpRetrievalClient, OllamaClient};
use ragchat::tokens::CharTokenEstimator;
use ragchat::Config;
use std::io::{BufRead, Write};

#[derive(Parser, Debug)]
#[command(name = "ragchat")]
#[command(about = "Interactive retrieval-augmented chat over an indexed document collection")]
struct Args {
    /// Generation service URL (e.g. https://1.2.3.4:11434)
    #[arg(long)]
    client: Option<String>,

    /// Retrieval service URL
    #[arg(long)]
    retrieval: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info"))
        .init();

    let args = Args::parse();
    let config = Config::load()?;

    let generation_endpoint = match args.client {
        Some(url) => {
            println!("Connected to generation service at {}", url);
            url
        }
        None => config.generation.endpoint.clone(),
    };
    let retrieval_endpoint = args
        .retrieval
        .unwrap_or_else(|| config.retrieval.endpoint.clone());

    println!("=== ragchat ===");
    println!("Model: {}", config.generation.model);
    println!("Context length: {}", config.generation.max_context);
    println!("Type 'exit' or 'quit' to leave.\n");

    let generation = OllamaClient::new(generation_endpoint);
    let retrieval = HttpRetrievalClient::new(retrieval_endpoint);
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

    let mut history = ConversationHistory::new();
    let stdin = std::io::stdin();

    loop {
        print!("You> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF ends the session
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "exit" | "quit") {
            println!("Goodbye!");
            break;
        }

        match orchestrator.answer(query, &mut history).await {
            Ok((answer, metrics)) => {
                println!("\nAssistant:\n{}\n", answer);

                if !metrics.tags.is_empty() {
                    println!("Tags: {}", metrics.tags.join(", "));
                }
                if !metrics.urls.is_empty() {
                    println!("References:");
                    for url in &metrics.urls {
                        println!("  - {}", url);
                    }
                }

                println!(
                    "rag: {:.4} s | generation: {:.4} s | user (tokens): {} | response (tokens): {}\n",
                    metrics.retrieval_ms as f64 / 1000.0,
                    metrics.generation_ms as f64 / 1000.0,
                    metrics.query_tokens,
                    metrics.response_tokens
                );
            }
            Err(e) => {
                // A failed query must not corrupt the conversation: drop the
                // pending turn so the history matches its pre-query state.
                log::error!("An error occurred: {}", e);
                history.discard_pending();
            }
        }
    }

    Ok(())
}
