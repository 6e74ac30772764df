//! Pipeline operators
//!
//! Each operator reads and mutates the shared [`RagContext`] and returns
//! a tagged outcome instead of raising: `Ok` when it did its job,
//! `Degraded` when it failed but the pipeline can continue without it,
//! `Failed` when the pipeline cannot proceed.

use async_trait::async_trait;
use haven_llm::{ChatRequest, LlmGateway};
use haven_types::{Message, ThoughtStage};
use std::sync::Arc;

use crate::context::RagContext;

mod decompose;
mod generate;
mod grade;
mod hyde;
mod query_rewrite;
mod reflect;
mod rerank;
mod retrieve;

pub use decompose::QueryDecomposition;
pub use generate::Generation;
pub use grade::DocumentGrader;
pub use hyde::Hyde;
pub use query_rewrite::QueryRewrite;
pub use reflect::Reflection;
pub use rerank::Rerank;
pub use retrieve::HybridRetrieval;

/// Result of running one operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorOutcome {
    /// Operator completed normally.
    Ok,
    /// Operator could not do its job; the pipeline continues without it.
    Degraded { reason: String },
    /// The pipeline cannot proceed past this operator.
    Failed { kind: String, detail: String },
}

impl OperatorOutcome {
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    pub fn failed(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Failed {
            kind: kind.into(),
            detail: detail.into(),
        }
    }
}

/// One step of the pipeline chain
#[async_trait]
pub trait Operator: Send + Sync {
    fn name(&self) -> &'static str;

    fn stage(&self) -> ThoughtStage;

    /// Run against the shared context, appending a thought describing
    /// what happened.
    async fn run(&self, ctx: &mut RagContext) -> OperatorOutcome;
}

/// One LLM round-trip with a system prompt, optional history, and a user
/// prompt. Returns the reply content or the error rendered as a string;
/// operators decide how to degrade.
pub(crate) async fn call_llm(
    llm: &Arc<LlmGateway>,
    model: &str,
    system: String,
    history: &[Message],
    user: String,
) -> std::result::Result<String, String> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system));
    messages.extend(history.iter().cloned());
    messages.push(Message::user(user));

    let request = ChatRequest::new(model, messages).with_temperature(0.2);
    llm.chat(request)
        .await
        .map(|response| response.content)
        .map_err(|error| error.to_string())
}
