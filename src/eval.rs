//! Evaluation harness: generate question/answer pairs from the document
//! collection, answer each question through the full retrieval pipeline,
//! and score the answers against their references.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::chat::{ConversationHistory, QueryOrchestrator};
use crate::services::GenerationService;

/// Prompt template for question/answer pair generation.
/// `{content}` is replaced with one chunk of document content.
const QA_PROMPT_TEMPLATE: &str = r#"Given the following document content, generate a question and answer pair that reflects important information from the text.

Document Content:
{content}

Please provide the output in the following format:

Question:
[Your question here]

Answer:
[Your answer here]"#;

/// A generated evaluation question with its reference answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub query: String,
    pub ground_truth: String,
}

/// Token-overlap precision, recall, and F1 between a reference answer and
/// a generated one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityScore {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl SimilarityScore {
    const ZERO: Self = Self {
        precision: 0.0,
        recall: 0.0,
        f1: 0.0,
    };
}

/// One evaluated question: the system's answer, its score, and timings
#[derive(Debug, Clone)]
pub struct EvalRecord {
    pub query: String,
    pub ground_truth: String,
    pub generated_answer: String,
    pub score: SimilarityScore,
    pub retrieval_ms: u128,
    pub generation_ms: u128,
}

/// Extract the question and answer sections from a model response.
///
/// Returns `None` when either marker is missing or a section is empty.
pub fn parse_qa_response(output: &str) -> Option<QaPair> {
    let (_, after_question) = output.split_once("Question:")?;
    let (question, answer) = after_question.split_once("Answer:")?;
    let query = question.trim();
    let ground_truth = answer.trim();
    if query.is_empty() || ground_truth.is_empty() {
        return None;
    }
    Some(QaPair {
        query: query.to_string(),
        ground_truth: ground_truth.to_string(),
    })
}

/// Generate up to `num_pairs` question/answer pairs, one per content chunk.
///
/// Generation failures and unparseable responses are logged and skipped so
/// a single bad chunk does not abort the dataset build.
pub async fn generate_qa_pairs(
    service: &dyn GenerationService,
    model: &str,
    contents: &[&str],
    num_pairs: usize,
) -> Vec<QaPair> {
    let mut pairs = Vec::new();
    for content in contents {
        if pairs.len() >= num_pairs {
            break;
        }
        let prompt = QA_PROMPT_TEMPLATE.replace("{content}", content.trim());
        match service.generate(model, &prompt).await {
            Ok(output) => match parse_qa_response(&output) {
                Some(pair) => pairs.push(pair),
                None => {
                    log::warn!("Failed to parse a question/answer pair from the model output")
                }
            },
            Err(e) => log::warn!("Error generating QA pair: {}", e),
        }
    }
    pairs
}

fn normalize_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Token-overlap F1 between a reference and a hypothesis.
///
/// Both sides are lowercased and split on non-alphanumeric characters;
/// overlap is counted per token occurrence. An empty side scores zero.
pub fn token_f1(reference: &str, hypothesis: &str) -> SimilarityScore {
    let ref_tokens = normalize_tokens(reference);
    let hyp_tokens = normalize_tokens(hypothesis);
    if ref_tokens.is_empty() || hyp_tokens.is_empty() {
        return SimilarityScore::ZERO;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in &ref_tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    let mut overlap = 0usize;
    for token in &hyp_tokens {
        if let Some(count) = counts.get_mut(token.as_str()) {
            if *count > 0 {
                *count -= 1;
                overlap += 1;
            }
        }
    }
    if overlap == 0 {
        return SimilarityScore::ZERO;
    }

    let precision = overlap as f64 / hyp_tokens.len() as f64;
    let recall = overlap as f64 / ref_tokens.len() as f64;
    SimilarityScore {
        precision,
        recall,
        f1: 2.0 * precision * recall / (precision + recall),
    }
}

/// Answer every pair through the orchestrator and score the results.
///
/// Each question is answered in isolation with a fresh conversation history,
/// so pairs do not influence each other. A failed query is recorded with an
/// empty answer and a zero score rather than aborting the run.
pub async fn evaluate_pairs(
    orchestrator: &QueryOrchestrator<'_>,
    pairs: &[QaPair],
) -> Vec<EvalRecord> {
    let mut records = Vec::new();
    for pair in pairs {
        let mut history = ConversationHistory::new();
        let (generated_answer, retrieval_ms, generation_ms) =
            match orchestrator.answer(&pair.query, &mut history).await {
                Ok((answer, metrics)) => (answer, metrics.retrieval_ms, metrics.generation_ms),
                Err(e) => {
                    log::error!("Error answering evaluation query: {}", e);
                    (String::new(), 0, 0)
                }
            };
        let score = token_f1(&pair.ground_truth, &generated_answer);
        records.push(EvalRecord {
            query: pair.query.clone(),
            ground_truth: pair.ground_truth.clone(),
            generated_answer,
            score,
            retrieval_ms,
            generation_ms,
        });
    }
    records
}

/// Mean F1 over all records, zero for an empty run
pub fn average_f1(records: &[EvalRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|r| r.score.f1).sum::<f64>() / records.len() as f64
}
