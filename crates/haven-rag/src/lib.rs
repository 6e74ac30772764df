//! Haven RAG Pipeline
//!
//! Turns a retrieval-intent request into a grounded answer through a
//! composable chain of operators: query rewrite, hypothetical document
//! drafting, decomposition, hybrid retrieval, grading, reranking,
//! generation, and self-reflection. Every operator appends a thought to
//! the request's reasoning chain and degrades gracefully rather than
//! failing the request.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;
pub mod context;
pub mod operators;
pub mod pipeline;
pub mod prompts;

pub use config::RagConfig;
pub use context::{RagContext, RagRequest, RagResponse};
pub use operators::{Operator, OperatorOutcome};
pub use pipeline::RagPipeline;

/// Pipeline mode selecting the generation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RagMode {
    Search,
    Compare,
    InvestmentAdvice,
    LocationInsights,
}

impl RagMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RagMode::Search => "search",
            RagMode::Compare => "compare",
            RagMode::InvestmentAdvice => "investment_advice",
            RagMode::LocationInsights => "location_insights",
        }
    }
}

/// Errors that abort the whole pipeline.
///
/// Operator failures degrade instead; only a failed retrieval with no
/// usable fallback or a failed generation surfaces as an error.
#[derive(Error, Debug, Clone)]
pub enum RagError {
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("generation failed: {0}")]
    Generation(String),
}

pub type Result<T> = std::result::Result<T, RagError>;
