use std::collections::VecDeque;

use crate::tokens::TokenEstimator;

/// One user/assistant exchange.
///
/// Created with `assistant = None` while the response is pending; exactly
/// one later call to `complete_pending` fills it in.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub user: String,
    pub assistant: Option<String>,
}

impl ConversationTurn {
    fn pending(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: None,
        }
    }

    /// Serialized form used for both prompt assembly and token estimation.
    /// A pending assistant renders as the empty string.
    pub fn render(&self) -> String {
        format!(
            "User: {}\nAssistant: {}\n",
            self.user,
            self.assistant.as_deref().unwrap_or("")
        )
    }
}

/// Token budget for prompt assembly
#[derive(Debug, Clone, Copy)]
pub struct TokenBudget {
    /// Maximum context window in estimated tokens
    pub max_context: usize,
    /// Safety margin so the assembled prompt stays below the window
    pub buffer: usize,
}

/// Ordered conversation history bounded by an estimated token budget.
///
/// Insertion order is chronological; eviction removes the oldest turn first.
/// At most one turn is pending, and only the last one.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// Whether the last turn is still awaiting its response
    pub fn has_pending(&self) -> bool {
        self.turns.back().is_some_and(|t| t.assistant.is_none())
    }

    /// Serialized history text for prompt assembly
    pub fn render(&self) -> String {
        self.turns.iter().map(|t| t.render()).collect()
    }

    /// Append a pending turn for `query`, then evict oldest turns until the
    /// estimated history cost fits `max_context - fixed_prompt_tokens -
    /// buffer`.
    ///
    /// Eviction is FIFO and never removes the just-appended turn: when that
    /// turn alone exceeds the budget the history reduces to exactly it.
    pub fn append_and_fit(
        &mut self,
        query: &str,
        fixed_prompt_tokens: usize,
        budget: &TokenBudget,
        estimator: &dyn TokenEstimator,
    ) {
        debug_assert!(!self.has_pending(), "previous turn was never resolved");
        self.turns.push_back(ConversationTurn::pending(query));

        let available = budget.max_context as i64
            - fixed_prompt_tokens as i64
            - budget.buffer as i64;

        let mut total: i64 = self
            .turns
            .iter()
            .map(|t| estimator.estimate(&t.render()) as i64)
            .sum();

        while total > available && self.turns.len() > 1 {
            // Oldest conversational context is sacrificed first
            if let Some(oldest) = self.turns.pop_front() {
                total -= estimator.estimate(&oldest.render()) as i64;
            }
        }

        if total > available {
            log::warn!(
                "Current query alone exceeds the history budget ({} > {} tokens)",
                total,
                available
            );
        }
    }

    /// Record the generated answer on the pending turn. No re-eviction.
    pub fn complete_pending(&mut self, answer: String) {
        match self.turns.back_mut() {
            Some(turn) if turn.assistant.is_none() => turn.assistant = Some(answer),
            _ => log::warn!("No pending turn to complete"),
        }
    }

    /// Drop a pending last turn, e.g. after a failed generation call.
    /// Returns true if a turn was removed.
    pub fn discard_pending(&mut self) -> bool {
        if self.has_pending() {
            self.turns.pop_back();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{CharTokenEstimator, TokenEstimator};

    const EST: CharTokenEstimator = CharTokenEstimator;

    fn total_tokens(history: &ConversationHistory) -> usize {
        history.iter().map(|t| EST.estimate(&t.render())).sum()
    }

    fn completed_history(exchanges: &[(&str, &str)]) -> ConversationHistory {
        let budget = TokenBudget {
            max_context: 1_000_000,
            buffer: 0,
        };
        let mut history = ConversationHistory::new();
        for (user, assistant) in exchanges {
            history.append_and_fit(user, 0, &budget, &EST);
            history.complete_pending(assistant.to_string());
        }
        history
    }

    #[test]
    fn test_turn_render() {
        let mut turn = ConversationTurn::pending("hi");
        assert_eq!(turn.render(), "User: hi\nAssistant: \n");
        turn.assistant = Some("hello".to_string());
        assert_eq!(turn.render(), "User: hi\nAssistant: hello\n");
    }

    #[test]
    fn test_append_within_budget_keeps_all_turns() {
        let budget = TokenBudget {
            max_context: 200,
            buffer: 20,
        };
        let mut history = completed_history(&[("a", "b"), ("c", "d")]);
        history.append_and_fit("e", 50, &budget, &EST);

        assert_eq!(history.len(), 3);
        assert!(history.has_pending());
    }

    #[test]
    fn test_eviction_is_fifo_and_respects_budget() {
        // max 200, buffer 20, fixed 50 => 130 tokens for history
        let budget = TokenBudget {
            max_context: 200,
            buffer: 20,
        };
        let long = "x".repeat(200); // ~54 tokens per rendered turn
        let mut history = completed_history(&[
            ("first", &long),
            ("second", &long),
            ("third", &long),
        ]);

        history.append_and_fit("current question", 50, &budget, &EST);

        // Remaining history must fit in 130 tokens
        assert!(total_tokens(&history) <= 130);
        // Oldest turns evicted, newest retained in order
        let users: Vec<&str> = history.iter().map(|t| t.user.as_str()).collect();
        assert_eq!(*users.last().unwrap(), "current question");
        assert!(!users.contains(&"first"));
        let mut expected_suffix: Vec<&str> =
            vec!["first", "second", "third", "current question"];
        expected_suffix.drain(..expected_suffix.len() - users.len());
        assert_eq!(users, expected_suffix);
    }

    #[test]
    fn test_oversized_current_turn_is_never_evicted() {
        let budget = TokenBudget {
            max_context: 100,
            buffer: 10,
        };
        let mut history = completed_history(&[("old", "answer")]);
        let huge_query = "q".repeat(2000);

        history.append_and_fit(&huge_query, 50, &budget, &EST);

        assert_eq!(history.len(), 1);
        assert!(history.has_pending());
        assert_eq!(history.iter().next().unwrap().user, huge_query);
    }

    #[test]
    fn test_complete_pending_sets_answer_once() {
        let mut history = completed_history(&[]);
        let budget = TokenBudget {
            max_context: 1000,
            buffer: 0,
        };
        history.append_and_fit("question", 0, &budget, &EST);
        history.complete_pending("answer".to_string());

        assert!(!history.has_pending());
        assert_eq!(
            history.iter().last().unwrap().assistant.as_deref(),
            Some("answer")
        );
    }

    #[test]
    fn test_discard_pending_restores_prior_state() {
        let budget = TokenBudget {
            max_context: 1000,
            buffer: 0,
        };
        let mut history = completed_history(&[("a", "b")]);
        let before = history.render();

        history.append_and_fit("failed question", 0, &budget, &EST);
        assert!(history.has_pending());
        assert!(history.discard_pending());

        assert_eq!(history.render(), before);
        assert!(!history.discard_pending());
    }

    #[test]
    fn test_render_concatenates_in_order() {
        let history = completed_history(&[("one", "1"), ("two", "2")]);
        assert_eq!(
            history.render(),
            "User: one\nAssistant: 1\nUser: two\nAssistant: 2\n"
        );
    }
}
