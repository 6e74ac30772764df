//! Orchestrator configuration

use std::time::Duration;

/// Immutable configuration passed in at construction
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Queries longer than this are truncated with a recorded warning.
    pub max_query_length: usize,
    /// Messages of history injected into downstream prompts.
    pub history_window: usize,
    /// Entries kept in the last-retrieved set.
    pub last_retrieved_k: usize,
    /// Minimum retrieval score for a keyword-mode detail match.
    pub detail_score_threshold: f64,
    /// Whole-request deadline.
    pub deadline: Duration,
    /// Logical model tag for direct chat calls.
    pub chat_model: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_query_length: 500,
            history_window: 10,
            last_retrieved_k: 5,
            detail_score_threshold: 0.01,
            deadline: Duration::from_secs(90),
            chat_model: "primary-chat".to_string(),
        }
    }
}
