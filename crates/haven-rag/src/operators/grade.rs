//! Document relevance grading operator

use async_trait::async_trait;
use haven_llm::LlmGateway;
use haven_types::{lenient_json, Thought, ThoughtStage};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use super::{call_llm, Operator, OperatorOutcome};
use crate::context::RagContext;
use crate::prompts;

/// Scores every candidate in one batched LLM call and drops documents
/// below the threshold. A failed or unparseable grade degrades to
/// keeping the full candidate set.
pub struct DocumentGrader {
    llm: Arc<LlmGateway>,
    model: String,
    threshold: f64,
}

impl DocumentGrader {
    pub fn new(llm: Arc<LlmGateway>, model: impl Into<String>, threshold: f64) -> Self {
        Self {
            llm,
            model: model.into(),
            threshold,
        }
    }

    fn parse_scores(reply: &str) -> Option<HashMap<String, f64>> {
        let value = lenient_json(reply)?;
        let scores = value.get("scores")?.as_array()?;
        let mut parsed = HashMap::new();
        for entry in scores {
            let id = entry.get("id")?.as_str()?;
            let score = entry.get("score")?.as_f64()?;
            parsed.insert(id.to_string(), score.clamp(0.0, 1.0));
        }
        Some(parsed)
    }
}

#[async_trait]
impl Operator for DocumentGrader {
    fn name(&self) -> &'static str {
        "document_grader"
    }

    fn stage(&self) -> ThoughtStage {
        ThoughtStage::Grading
    }

    async fn run(&self, ctx: &mut RagContext) -> OperatorOutcome {
        if ctx.documents.is_empty() {
            return OperatorOutcome::Ok;
        }

        let reply = match call_llm(
            &self.llm,
            &self.model,
            prompts::grade_system(),
            &[],
            prompts::grade_user(&ctx.cleaned_query, &ctx.documents),
        )
        .await
        {
            Ok(reply) => reply,
            Err(error) => {
                ctx.chain.record(
                    Thought::new(self.stage(), "grading unavailable, keeping all candidates", 0.6)
                        .with_data(json!({ "error": error })),
                );
                return OperatorOutcome::degraded(format!("grader failed: {error}"));
            }
        };

        let Some(scores) = Self::parse_scores(&reply) else {
            ctx.chain.record(Thought::new(
                self.stage(),
                "grader reply unparseable, keeping all candidates",
                0.6,
            ));
            return OperatorOutcome::degraded("grader reply unparseable");
        };

        let before = ctx.documents.len();
        // Ungraded documents keep a passing grade rather than vanish
        ctx.documents.retain(|document| {
            scores
                .get(&document.property_id)
                .map_or(true, |score| *score >= self.threshold)
        });

        ctx.chain.record(
            Thought::new(
                self.stage(),
                format!(
                    "graded {before} candidates, {} passed the relevance bar",
                    ctx.documents.len()
                ),
                0.85,
            )
            .with_data(json!({
                "graded": before,
                "survivors": ctx.documents.len(),
                "threshold": self.threshold,
            })),
        );
        OperatorOutcome::Ok
    }
}
