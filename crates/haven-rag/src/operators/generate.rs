//! Grounded answer generation operator

use async_trait::async_trait;
use haven_llm::LlmGateway;
use haven_types::{Thought, ThoughtStage};
use serde_json::json;
use std::sync::Arc;

use super::{call_llm, Operator, OperatorOutcome};
use crate::context::RagContext;
use crate::prompts;

/// Produces the user-facing answer from the top-K surviving documents,
/// injecting them as context with a grounding mandate. On a
/// regeneration pass the reflection critique is appended to the prompt.
pub struct Generation {
    llm: Arc<LlmGateway>,
    model: String,
    top_k: usize,
}

impl Generation {
    pub fn new(llm: Arc<LlmGateway>, model: impl Into<String>, top_k: usize) -> Self {
        Self {
            llm,
            model: model.into(),
            top_k,
        }
    }
}

#[async_trait]
impl Operator for Generation {
    fn name(&self) -> &'static str {
        "generation"
    }

    fn stage(&self) -> ThoughtStage {
        ThoughtStage::Generation
    }

    async fn run(&self, ctx: &mut RagContext) -> OperatorOutcome {
        ctx.documents.truncate(self.top_k);

        let mut user_prompt = prompts::generation_user(&ctx.cleaned_query, &ctx.documents);
        if let Some(critique) = ctx.critique.take() {
            user_prompt.push_str(&format!(
                "\nA previous draft was judged insufficient: {critique}\nAddress the critique in \
                 this answer."
            ));
        }

        let system = prompts::generation_system(ctx.request.mode, &ctx.request.language);
        match call_llm(
            &self.llm,
            &self.model,
            system,
            &ctx.request.history,
            user_prompt,
        )
        .await
        {
            Ok(reply) => {
                let is_regeneration = ctx.answer.is_some();
                ctx.answer = Some(reply);
                ctx.chain.record(
                    Thought::new(
                        self.stage(),
                        if is_regeneration {
                            "regenerated answer with reflection critique"
                        } else {
                            "generated grounded answer"
                        },
                        0.85,
                    )
                    .with_data(json!({
                        "context_documents": ctx.documents.len(),
                        "regeneration": is_regeneration,
                    })),
                );
                OperatorOutcome::Ok
            }
            Err(error) => {
                ctx.chain.record(
                    Thought::new(self.stage(), "generation failed", 0.0)
                        .with_data(json!({ "error": error })),
                );
                OperatorOutcome::failed("generation", error)
            }
        }
    }
}
