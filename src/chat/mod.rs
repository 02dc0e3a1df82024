pub mod context;
pub mod orchestrator;

pub use context::{ConversationHistory, ConversationTurn, TokenBudget};
pub use orchestrator::{QueryMetrics, QueryOrchestrator};
