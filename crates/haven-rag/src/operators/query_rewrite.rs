//! Query normalization operator

use async_trait::async_trait;
use haven_llm::LlmGateway;
use haven_types::{Thought, ThoughtStage};
use serde_json::json;
use std::sync::Arc;

use super::{call_llm, Operator, OperatorOutcome};
use crate::context::RagContext;
use crate::prompts;

/// Cleans the raw query: typo fixes, abbreviation expansion, domain
/// terms preserved. A failed rewrite keeps the original query.
pub struct QueryRewrite {
    llm: Arc<LlmGateway>,
    model: String,
}

impl QueryRewrite {
    pub fn new(llm: Arc<LlmGateway>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Operator for QueryRewrite {
    fn name(&self) -> &'static str {
        "query_rewrite"
    }

    fn stage(&self) -> ThoughtStage {
        ThoughtStage::QueryAnalysis
    }

    async fn run(&self, ctx: &mut RagContext) -> OperatorOutcome {
        let original = ctx.cleaned_query.clone();
        match call_llm(
            &self.llm,
            &self.model,
            prompts::rewrite_system(),
            &[],
            original.clone(),
        )
        .await
        {
            Ok(reply) => {
                let cleaned = reply.trim();
                if !cleaned.is_empty() {
                    ctx.cleaned_query = cleaned.to_string();
                }
                ctx.chain.record(
                    Thought::new(self.stage(), "normalized user query", 0.9).with_data(json!({
                        "original": original,
                        "cleaned": ctx.cleaned_query,
                    })),
                );
                OperatorOutcome::Ok
            }
            Err(error) => {
                ctx.chain.record(
                    Thought::new(
                        self.stage(),
                        "query rewrite unavailable, keeping original query",
                        0.6,
                    )
                    .with_data(json!({ "error": error })),
                );
                OperatorOutcome::degraded(format!("rewrite failed: {error}"))
            }
        }
    }
}
