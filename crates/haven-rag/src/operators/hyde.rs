//! Hypothetical document drafting operator

use async_trait::async_trait;
use haven_llm::LlmGateway;
use haven_types::{Thought, ThoughtStage};
use serde_json::json;
use std::sync::Arc;

use super::{call_llm, Operator, OperatorOutcome};
use crate::context::RagContext;
use crate::prompts;

/// Drafts a short ideal listing used as additional retrieval text. The
/// pipeline only schedules this operator for short or high-ambiguity
/// queries.
pub struct Hyde {
    llm: Arc<LlmGateway>,
    model: String,
}

impl Hyde {
    pub fn new(llm: Arc<LlmGateway>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Operator for Hyde {
    fn name(&self) -> &'static str {
        "hyde"
    }

    fn stage(&self) -> ThoughtStage {
        ThoughtStage::QueryAnalysis
    }

    async fn run(&self, ctx: &mut RagContext) -> OperatorOutcome {
        match call_llm(
            &self.llm,
            &self.model,
            prompts::hyde_system(),
            &[],
            ctx.cleaned_query.clone(),
        )
        .await
        {
            Ok(reply) => {
                let draft = reply.trim();
                if draft.is_empty() {
                    return OperatorOutcome::degraded("hyde draft came back empty");
                }
                ctx.hyde_text = Some(draft.to_string());
                ctx.chain.record(
                    Thought::new(self.stage(), "drafted hypothetical ideal listing", 0.8)
                        .with_data(json!({ "draft_chars": draft.len() })),
                );
                OperatorOutcome::Ok
            }
            Err(error) => {
                ctx.chain.record(
                    Thought::new(self.stage(), "hyde drafting unavailable", 0.7)
                        .with_data(json!({ "error": error })),
                );
                OperatorOutcome::degraded(format!("hyde failed: {error}"))
            }
        }
    }
}
