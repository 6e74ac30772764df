//! Answer self-reflection operator

use async_trait::async_trait;
use haven_llm::LlmGateway;
use haven_types::{lenient_json, Thought, ThoughtStage};
use serde_json::json;
use std::sync::Arc;

use super::{call_llm, Operator, OperatorOutcome};
use crate::context::RagContext;
use crate::prompts;

/// Scores the generated answer on coverage, grounding, and clarity. A
/// weak overall score stores the critique so the pipeline can spend its
/// regeneration budget; a failed reflection keeps the first generation.
pub struct Reflection {
    llm: Arc<LlmGateway>,
    model: String,
    threshold: f64,
}

#[derive(Debug)]
struct ReflectionScores {
    coverage: f64,
    grounding: f64,
    clarity: f64,
    critique: String,
}

impl ReflectionScores {
    fn overall(&self) -> f64 {
        (self.coverage + self.grounding + self.clarity) / 3.0
    }
}

impl Reflection {
    pub fn new(llm: Arc<LlmGateway>, model: impl Into<String>, threshold: f64) -> Self {
        Self {
            llm,
            model: model.into(),
            threshold,
        }
    }

    fn parse_scores(reply: &str) -> Option<ReflectionScores> {
        let value = lenient_json(reply)?;
        let score = |key: &str| value.get(key).and_then(|v| v.as_f64()).map(|v| v.clamp(0.0, 1.0));
        Some(ReflectionScores {
            coverage: score("coverage")?,
            grounding: score("grounding")?,
            clarity: score("clarity")?,
            critique: value
                .get("critique")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
        })
    }
}

#[async_trait]
impl Operator for Reflection {
    fn name(&self) -> &'static str {
        "reflection"
    }

    fn stage(&self) -> ThoughtStage {
        ThoughtStage::Reflection
    }

    async fn run(&self, ctx: &mut RagContext) -> OperatorOutcome {
        let Some(answer) = ctx.answer.clone() else {
            return OperatorOutcome::degraded("nothing to reflect on");
        };

        let user_prompt = format!(
            "{}\n\nDraft answer:\n{answer}",
            prompts::generation_user(&ctx.cleaned_query, &ctx.documents)
        );

        let reply = match call_llm(
            &self.llm,
            &self.model,
            prompts::reflection_system(),
            &[],
            user_prompt,
        )
        .await
        {
            Ok(reply) => reply,
            Err(error) => {
                ctx.chain.record(
                    Thought::new(self.stage(), "reflection unavailable, keeping first draft", 0.7)
                        .with_data(json!({ "error": error })),
                );
                return OperatorOutcome::degraded(format!("reflection failed: {error}"));
            }
        };

        let Some(scores) = Self::parse_scores(&reply) else {
            ctx.chain.record(Thought::new(
                self.stage(),
                "reflection reply unparseable, keeping first draft",
                0.7,
            ));
            return OperatorOutcome::degraded("reflection reply unparseable");
        };

        let overall = scores.overall();
        let below_bar = overall < self.threshold;
        ctx.chain.record(
            Thought::new(
                self.stage(),
                format!("scored draft answer at {overall:.2}"),
                overall,
            )
            .with_data(json!({
                "coverage": scores.coverage,
                "grounding": scores.grounding,
                "clarity": scores.clarity,
                "below_threshold": below_bar,
            })),
        );

        if below_bar {
            ctx.critique = Some(if scores.critique.is_empty() {
                "the draft did not fully cover or ground the question".to_string()
            } else {
                scores.critique
            });
        }
        OperatorOutcome::Ok
    }
}
