/// Pluggable token estimation.
///
/// Prompt budgeting only needs an estimate, not an exact count. The default
/// implementation uses a character ratio; a character-accurate tokenizer can
/// be swapped in behind the same trait.
pub trait TokenEstimator: Send + Sync {
    /// Estimate the token count of `text`.
    fn estimate(&self, text: &str) -> usize;
}

/// Character-ratio estimator: 1 token ≈ 4 characters, rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharTokenEstimator;

impl TokenEstimator for CharTokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        (text.chars().count() + 3) / 4
    }
}
