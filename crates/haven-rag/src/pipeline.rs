//! The pipeline driver
//!
//! Walks the enabled operator chain over a shared context. Operator
//! failures degrade wherever the chain can continue; only retrieval and
//! first-pass generation are load-bearing.

use haven_llm::LlmGateway;
use haven_retrieval::RetrievalGateway;
use haven_types::{Thought, ThoughtStage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::RagConfig;
use crate::context::{RagContext, RagRequest, RagResponse};
use crate::operators::{
    DocumentGrader, Generation, Hyde, HybridRetrieval, Operator, OperatorOutcome,
    QueryDecomposition, QueryRewrite, Reflection, Rerank,
};
use crate::{prompts, RagError, Result};

/// Composable retrieval-augmented generation pipeline
pub struct RagPipeline {
    llm: Arc<LlmGateway>,
    retrieval: Arc<RetrievalGateway>,
    config: RagConfig,
}

impl RagPipeline {
    pub fn new(llm: Arc<LlmGateway>, retrieval: Arc<RetrievalGateway>, config: RagConfig) -> Self {
        Self {
            llm,
            retrieval,
            config,
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// HyDE only pays off on short or ambiguous queries.
    fn hyde_applies(&self, ctx: &RagContext) -> bool {
        if !self.config.enable_hyde {
            return false;
        }
        let token_count = ctx.cleaned_query.split_whitespace().count();
        token_count <= self.config.hyde_short_query_tokens || ctx.request.ambiguous_hint
    }

    /// Run one operator, timing it and stamping the latency onto every
    /// thought it appended.
    async fn run_operator(&self, operator: &dyn Operator, ctx: &mut RagContext) -> OperatorOutcome {
        let started = Instant::now();
        let thoughts_before = ctx.chain.len();
        let outcome = operator.run(ctx).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        for thought in ctx.chain.thoughts.iter_mut().skip(thoughts_before) {
            thought.latency_ms = Some(latency_ms);
        }

        match &outcome {
            OperatorOutcome::Ok => {
                debug!(operator = operator.name(), latency_ms, "operator complete")
            }
            OperatorOutcome::Degraded { reason } => {
                warn!(operator = operator.name(), reason, "operator degraded")
            }
            OperatorOutcome::Failed { kind, detail } => {
                error!(operator = operator.name(), kind, detail, "operator failed")
            }
        }
        outcome
    }

    /// Run the full chain for one request.
    pub async fn run(&self, request: RagRequest) -> Result<RagResponse> {
        let request_id = request.request_id;
        let mut ctx = RagContext::new(request);
        let model = &self.config.chat_model;

        if self.config.enable_rewrite {
            let rewrite = QueryRewrite::new(self.llm.clone(), model);
            self.run_operator(&rewrite, &mut ctx).await;
        }

        if self.hyde_applies(&ctx) {
            let hyde = Hyde::new(self.llm.clone(), model);
            self.run_operator(&hyde, &mut ctx).await;
        }

        if self.config.enable_decomposition {
            let decompose = QueryDecomposition::new(self.llm.clone(), model);
            self.run_operator(&decompose, &mut ctx).await;
        }

        let retrieve = HybridRetrieval::new(self.retrieval.clone(), self.config.retrieval_limit);
        if let OperatorOutcome::Failed { detail, .. } = self.run_operator(&retrieve, &mut ctx).await
        {
            return Err(RagError::Retrieval(detail));
        }

        if self.config.enable_grading && !ctx.documents.is_empty() {
            let grader = DocumentGrader::new(self.llm.clone(), model, self.config.grader_threshold);
            self.run_operator(&grader, &mut ctx).await;
        }

        // Nothing survived: skip rerank and answer politely without an
        // LLM round-trip, keeping the empty source list.
        if ctx.documents.is_empty() {
            let answer = prompts::no_matches_message(&ctx.request.language);
            ctx.chain.record(Thought::new(
                ThoughtStage::Generation,
                "no listings survived retrieval and grading, returning polite notice",
                0.5,
            ));
            let confidence = ctx.chain.overall_confidence;
            return Ok(RagResponse {
                answer,
                sources: Vec::new(),
                chain: ctx.chain,
                confidence,
            });
        }

        if self.config.enable_rerank {
            let rerank = Rerank::new(self.llm.clone(), model);
            self.run_operator(&rerank, &mut ctx).await;
        }

        let generation = Generation::new(self.llm.clone(), model, self.config.generation_top_k);
        if let OperatorOutcome::Failed { detail, .. } =
            self.run_operator(&generation, &mut ctx).await
        {
            return Err(RagError::Generation(detail));
        }

        if self.config.enable_reflection {
            let reflection =
                Reflection::new(self.llm.clone(), model, self.config.reflection_threshold);
            self.run_operator(&reflection, &mut ctx).await;

            if ctx.critique.is_some() && ctx.regenerations_used < self.config.max_regenerations {
                ctx.regenerations_used += 1;
                info!(%request_id, "reflection below threshold, spending regeneration budget");
                // A failed regeneration keeps the first draft
                self.run_operator(&generation, &mut ctx).await;
            }
        }

        let confidence = ctx.chain.overall_confidence;
        let answer = ctx
            .answer
            .take()
            .unwrap_or_else(|| prompts::no_matches_message(&ctx.request.language));

        Ok(RagResponse {
            answer,
            sources: ctx.documents,
            chain: ctx.chain,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_llm::{GatewayConfig, MockLlmProvider, ModelRoute, RoutingTable};
    use haven_retrieval::{FixtureEngine, RetrievalConfig, SearchFilters};
    use haven_types::{PropertyFields, RetrievedDocument};

    fn llm_with(provider: MockLlmProvider) -> Arc<LlmGateway> {
        let mut routing = RoutingTable::new();
        routing.set("primary-chat", vec![ModelRoute::new("mock", "m")]);
        let mut gateway = LlmGateway::new(GatewayConfig {
            routing,
            ..GatewayConfig::default()
        });
        gateway.register_provider(Arc::new(provider));
        Arc::new(gateway)
    }

    fn corpus() -> Vec<RetrievedDocument> {
        vec![
            RetrievedDocument::new("p-1", "Căn hộ 2 phòng ngủ Quận 7").with_fields(
                PropertyFields {
                    bedrooms: Some(2),
                    district: Some("Quận 7".to_string()),
                    price: Some(2_800_000_000.0),
                    ..Default::default()
                },
            ),
            RetrievedDocument::new("p-2", "Căn hộ 3 phòng ngủ Quận 7").with_fields(
                PropertyFields {
                    bedrooms: Some(3),
                    district: Some("Quận 7".to_string()),
                    price: Some(4_200_000_000.0),
                    ..Default::default()
                },
            ),
        ]
    }

    fn retrieval_over(documents: Vec<RetrievedDocument>) -> Arc<RetrievalGateway> {
        Arc::new(RetrievalGateway::new(
            Arc::new(FixtureEngine::with_documents(documents)),
            RetrievalConfig::default(),
        ))
    }

    #[tokio::test]
    async fn minimal_chain_retrieves_and_generates() {
        let llm = llm_with(MockLlmProvider::named("mock").with_reply("Đây là các căn hộ [p-1]"));
        let pipeline = RagPipeline::new(llm, retrieval_over(corpus()), RagConfig::minimal());

        let response = pipeline
            .run(RagRequest::new("căn hộ quận 7"))
            .await
            .unwrap();

        assert!(response.answer.contains("p-1"));
        assert!(!response.sources.is_empty());
        let stages: Vec<_> = response.chain.thoughts.iter().map(|t| t.stage).collect();
        assert!(stages.contains(&ThoughtStage::Retrieval));
        assert!(stages.contains(&ThoughtStage::Generation));
    }

    #[tokio::test]
    async fn every_source_comes_from_retrieval() {
        let llm = llm_with(MockLlmProvider::named("mock").with_reply("answer"));
        let pipeline = RagPipeline::new(llm, retrieval_over(corpus()), RagConfig::minimal());

        let response = pipeline
            .run(RagRequest::new("căn hộ quận 7"))
            .await
            .unwrap();

        let corpus_ids: Vec<String> = corpus().iter().map(|d| d.property_id.clone()).collect();
        for source in &response.sources {
            assert!(corpus_ids.contains(&source.property_id));
        }
    }

    #[tokio::test]
    async fn zero_matches_yields_polite_notice_and_empty_sources() {
        let llm = llm_with(MockLlmProvider::named("mock").with_reply("should not be called"));
        let pipeline = RagPipeline::new(llm, retrieval_over(vec![]), RagConfig::minimal());

        let response = pipeline
            .run(RagRequest::new("biệt thự trên sao Hỏa").with_language("vi"))
            .await
            .unwrap();

        assert!(response.answer.contains("không tìm thấy"));
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn grader_drops_low_scoring_documents() {
        let provider = MockLlmProvider::named("mock").with_replies([
            // grader pass
            "{\"scores\": [{\"id\": \"p-1\", \"score\": 0.9}, {\"id\": \"p-2\", \"score\": 0.1}]}"
                .to_string(),
            // generation
            "Chỉ còn căn [p-1] phù hợp".to_string(),
        ]);
        let config = RagConfig {
            enable_rewrite: false,
            enable_rerank: false,
            enable_reflection: false,
            ..RagConfig::default()
        };
        let pipeline = RagPipeline::new(llm_with(provider), retrieval_over(corpus()), config);

        let response = pipeline
            .run(RagRequest::new("căn hộ 2 phòng ngủ quận 7"))
            .await
            .unwrap();

        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].property_id, "p-1");
    }

    #[tokio::test]
    async fn unparseable_grade_keeps_all_candidates() {
        let provider = MockLlmProvider::named("mock").with_replies([
            "these all look fine".to_string(), // grader, unparseable
            "answer".to_string(),              // generation
        ]);
        let config = RagConfig {
            enable_rewrite: false,
            enable_rerank: false,
            enable_reflection: false,
            ..RagConfig::default()
        };
        let pipeline = RagPipeline::new(llm_with(provider), retrieval_over(corpus()), config);

        let response = pipeline
            .run(RagRequest::new("căn hộ quận 7"))
            .await
            .unwrap();
        assert_eq!(response.sources.len(), 2);
    }

    #[tokio::test]
    async fn weak_reflection_triggers_exactly_one_regeneration() {
        let provider = MockLlmProvider::named("mock").with_replies([
            "first draft".to_string(), // generation
            // reflection: below the 0.7 bar
            "{\"coverage\": 0.4, \"grounding\": 0.4, \"clarity\": 0.5, \"critique\": \"cite listings\"}"
                .to_string(),
            "second draft [p-1]".to_string(), // regeneration
        ]);
        let config = RagConfig {
            enable_rewrite: false,
            enable_grading: false,
            enable_rerank: false,
            ..RagConfig::default()
        };
        let pipeline = RagPipeline::new(llm_with(provider), retrieval_over(corpus()), config);

        let response = pipeline
            .run(RagRequest::new("căn hộ quận 7"))
            .await
            .unwrap();

        assert_eq!(response.answer, "second draft [p-1]");
        let generations = response
            .chain
            .thoughts
            .iter()
            .filter(|t| t.stage == ThoughtStage::Generation)
            .count();
        assert_eq!(generations, 2);
    }

    #[tokio::test]
    async fn rerank_reorders_but_preserves_the_set() {
        let provider = MockLlmProvider::named("mock").with_replies([
            "{\"order\": [\"p-2\", \"p-1\"]}".to_string(), // rerank
            "answer".to_string(),                          // generation
        ]);
        let config = RagConfig {
            enable_rewrite: false,
            enable_grading: false,
            enable_reflection: false,
            ..RagConfig::default()
        };
        let pipeline = RagPipeline::new(llm_with(provider), retrieval_over(corpus()), config);

        let response = pipeline
            .run(RagRequest::new("căn hộ quận 7"))
            .await
            .unwrap();
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].property_id, "p-2");
    }

    #[tokio::test]
    async fn llm_outage_degrades_to_retrieval_order_without_failing() {
        // Every LLM call fails; grading, rerank, reflection all degrade.
        // Generation fails too, which is the only fatal step.
        let provider = MockLlmProvider::named("mock").always_failing();
        let config = RagConfig {
            enable_rewrite: false,
            ..RagConfig::default()
        };
        let pipeline = RagPipeline::new(llm_with(provider), retrieval_over(corpus()), config);

        let error = pipeline
            .run(RagRequest::new("căn hộ quận 7"))
            .await
            .unwrap_err();
        assert!(matches!(error, RagError::Generation(_)));
    }

    #[tokio::test]
    async fn thoughts_carry_latency_and_append_order() {
        let llm = llm_with(MockLlmProvider::named("mock").with_reply("answer"));
        let pipeline = RagPipeline::new(llm, retrieval_over(corpus()), RagConfig::minimal());

        let response = pipeline
            .run(RagRequest::new("căn hộ quận 7"))
            .await
            .unwrap();
        for thought in &response.chain.thoughts {
            assert!(thought.latency_ms.is_some());
        }
    }

    #[tokio::test]
    async fn filters_flow_through_to_retrieval() {
        let llm = llm_with(MockLlmProvider::named("mock").with_reply("answer"));
        let pipeline = RagPipeline::new(llm, retrieval_over(corpus()), RagConfig::minimal());

        let filters = SearchFilters {
            bedrooms: Some(2),
            ..Default::default()
        };
        let response = pipeline
            .run(RagRequest::new("căn hộ quận 7").with_filters(filters))
            .await
            .unwrap();
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].property_id, "p-1");
    }
}
