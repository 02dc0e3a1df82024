use std::collections::BTreeSet;
use std::time::Instant;

use crate::error::Result;
use crate::services::{GenerationService, RetrievalService};
use crate::tokens::TokenEstimator;
use super::context::{ConversationHistory, TokenBudget};

/// Fixed instruction template; `{context}` is replaced with the retrieved
/// context block before token counting.
const INSTRUCTION_TEMPLATE: &str = "You are an assistant answering questions from the indexed document collection. When providing code examples, format them
as Markdown code blocks with the appropriate language specified for syntax highlighting.

Context:
{context}

Conversation History:
";

/// Per-query timing and token metrics, plus the aggregated display sets
#[derive(Debug, Clone)]
pub struct QueryMetrics {
    pub retrieval_ms: u128,
    pub generation_ms: u128,
    pub query_tokens: usize,
    pub response_tokens: usize,
    pub tags: Vec<String>,
    pub urls: Vec<String>,
}

/// Per-query orchestration: retrieval, context assembly, budget fitting,
/// generation, and metrics.
pub struct QueryOrchestrator<'a> {
    retrieval: &'a dyn RetrievalService,
    generation: &'a dyn GenerationService,
    estimator: &'a dyn TokenEstimator,
    model: String,
    budget: TokenBudget,
    top_k: usize,
    rerank_k: usize,
}

impl<'a> QueryOrchestrator<'a> {
    pub fn new(
        retrieval: &'a dyn RetrievalService,
        generation: &'a dyn GenerationService,
        estimator: &'a dyn TokenEstimator,
        model: impl Into<String>,
        budget: TokenBudget,
        top_k: usize,
        rerank_k: usize,
    ) -> Self {
        Self {
            retrieval,
            generation,
            estimator,
            model: model.into(),
            budget,
            top_k,
            rerank_k,
        }
    }

    /// Answer one user query against the retrieval index.
    ///
    /// Service errors propagate unchanged; on a generation failure the
    /// pending turn is left in `history` for the caller to discard or retry.
    pub async fn answer(
        &self,
        query: &str,
        history: &mut ConversationHistory,
    ) -> Result<(String, QueryMetrics)> {
        let retrieval_start = Instant::now();
        let initial = self.retrieval.search(query, self.top_k).await?;
        let contents: Vec<String> = initial.iter().map(|d| d.content.clone()).collect();
        let reranked = self
            .retrieval
            .rerank(query, &contents, self.rerank_k)
            .await?;
        let retrieval_ms = retrieval_start.elapsed().as_millis();

        let context = reranked
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        // Tags and urls are aggregated from the full initial set, not the
        // reranked subset
        let mut tags = BTreeSet::new();
        let mut urls = BTreeSet::new();
        for doc in &initial {
            if let Some(metadata) = &doc.document_metadata {
                tags.extend(metadata.tags.iter().cloned());
                urls.extend(metadata.urls.iter().cloned());
            }
        }

        let fixed_prompt = INSTRUCTION_TEMPLATE.replace("{context}", &context);
        let fixed_prompt_tokens = self.estimator.estimate(&fixed_prompt);

        history.append_and_fit(query, fixed_prompt_tokens, &self.budget, self.estimator);

        let prompt = format!("{}{}", fixed_prompt, history.render());

        let generation_start = Instant::now();
        let answer = self.generation.generate(&self.model, &prompt).await?;
        let generation_ms = generation_start.elapsed().as_millis();

        history.complete_pending(answer.clone());

        let metrics = QueryMetrics {
            retrieval_ms,
            generation_ms,
            query_tokens: self.estimator.estimate(query),
            response_tokens: self.estimator.estimate(&answer),
            tags: tags.into_iter().collect(),
            urls: urls.into_iter().collect(),
        };

        Ok((answer, metrics))
    }
}
