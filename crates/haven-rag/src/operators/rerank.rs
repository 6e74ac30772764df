//! Candidate reordering operator

use async_trait::async_trait;
use haven_llm::LlmGateway;
use haven_types::{lenient_json, Thought, ThoughtStage};
use serde_json::json;
use std::sync::Arc;

use super::{call_llm, Operator, OperatorOutcome};
use crate::context::RagContext;
use crate::prompts;

/// Produces a single LLM ordering over the surviving candidates.
/// Preserves the set: ids the model forgets keep their relative
/// retrieval order at the tail, ids it invents are ignored. A failed
/// rerank degrades to retrieval order.
pub struct Rerank {
    llm: Arc<LlmGateway>,
    model: String,
}

impl Rerank {
    pub fn new(llm: Arc<LlmGateway>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    fn parse_order(reply: &str) -> Option<Vec<String>> {
        let value = lenient_json(reply)?;
        let order = value.get("order")?.as_array()?;
        Some(
            order
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::to_string)
                .collect(),
        )
    }
}

#[async_trait]
impl Operator for Rerank {
    fn name(&self) -> &'static str {
        "rerank"
    }

    fn stage(&self) -> ThoughtStage {
        ThoughtStage::Grading
    }

    async fn run(&self, ctx: &mut RagContext) -> OperatorOutcome {
        if ctx.documents.len() < 2 {
            return OperatorOutcome::Ok;
        }

        let reply = match call_llm(
            &self.llm,
            &self.model,
            prompts::rerank_system(),
            &[],
            prompts::grade_user(&ctx.cleaned_query, &ctx.documents),
        )
        .await
        {
            Ok(reply) => reply,
            Err(error) => {
                ctx.chain.record(
                    Thought::new(self.stage(), "rerank unavailable, keeping retrieval order", 0.7)
                        .with_data(json!({ "error": error })),
                );
                return OperatorOutcome::degraded(format!("rerank failed: {error}"));
            }
        };

        let Some(order) = Self::parse_order(&reply) else {
            ctx.chain.record(Thought::new(
                self.stage(),
                "rerank reply unparseable, keeping retrieval order",
                0.7,
            ));
            return OperatorOutcome::degraded("rerank reply unparseable");
        };

        let mut reordered = Vec::with_capacity(ctx.documents.len());
        for id in &order {
            if let Some(position) = ctx
                .documents
                .iter()
                .position(|d| &d.property_id == id)
            {
                reordered.push(ctx.documents.remove(position));
            }
        }
        // Forgotten ids keep retrieval order at the tail
        reordered.append(&mut ctx.documents);
        ctx.documents = reordered;

        ctx.chain.record(
            Thought::new(self.stage(), "reranked candidates by full query intent", 0.85)
                .with_data(json!({ "order": order })),
        );
        OperatorOutcome::Ok
    }
}
