//! Multi-intent query decomposition operator

use async_trait::async_trait;
use haven_llm::LlmGateway;
use haven_types::{lenient_json, Thought, ThoughtStage};
use serde_json::json;
use std::sync::Arc;

use super::{call_llm, Operator, OperatorOutcome};
use crate::context::RagContext;
use crate::prompts;

/// Splits a multi-intent query into sub-queries; retrieval then runs
/// each sub-query in parallel and merges the results.
pub struct QueryDecomposition {
    llm: Arc<LlmGateway>,
    model: String,
}

impl QueryDecomposition {
    pub fn new(llm: Arc<LlmGateway>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Operator for QueryDecomposition {
    fn name(&self) -> &'static str {
        "query_decomposition"
    }

    fn stage(&self) -> ThoughtStage {
        ThoughtStage::QueryAnalysis
    }

    async fn run(&self, ctx: &mut RagContext) -> OperatorOutcome {
        let reply = match call_llm(
            &self.llm,
            &self.model,
            prompts::decompose_system(),
            &[],
            ctx.cleaned_query.clone(),
        )
        .await
        {
            Ok(reply) => reply,
            Err(error) => {
                ctx.chain.record(
                    Thought::new(self.stage(), "decomposition unavailable", 0.7)
                        .with_data(json!({ "error": error })),
                );
                return OperatorOutcome::degraded(format!("decomposition failed: {error}"));
            }
        };

        let sub_queries: Vec<String> = lenient_json(&reply)
            .and_then(|value| {
                value.get("sub_queries").and_then(|list| {
                    list.as_array().map(|items| {
                        items
                            .iter()
                            .filter_map(|item| item.as_str())
                            .map(str::to_string)
                            .filter(|q| !q.trim().is_empty())
                            .collect()
                    })
                })
            })
            .unwrap_or_default();

        if sub_queries.len() > 1 {
            ctx.chain.record(
                Thought::new(self.stage(), "split query into sub-queries", 0.85).with_data(
                    json!({ "sub_queries": sub_queries }),
                ),
            );
            ctx.sub_queries = sub_queries;
        } else {
            ctx.chain.record(Thought::new(
                self.stage(),
                "query carries a single intent",
                0.9,
            ));
        }
        OperatorOutcome::Ok
    }
}
