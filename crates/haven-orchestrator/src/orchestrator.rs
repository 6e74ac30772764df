//! The orchestration flow
//!
//! Ten stages, each appending to the reasoning chain: validation,
//! language detection, conversation load, knowledge expansion, ambiguity
//! detection, intent classification, routing, handler execution, state
//! update, and response assembly.

use haven_llm::{ChatRequest, LlmGateway};
use haven_rag::{RagMode, RagPipeline, RagRequest};
use haven_retrieval::{RangeFilter, SearchFilters};
use haven_types::{
    AmbiguityItem, Message, ReasoningChain, ResponseComponent, RetrievedDocument, Thought,
    ThoughtStage,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ambiguity::AmbiguityDetector;
use crate::config::OrchestratorConfig;
use crate::conversation::{build_retrieved_refs, ConversationStore, RetrievedRef};
use crate::detail::PropertyDetailHandler;
use crate::directory::ServiceDirectory;
use crate::intent::{ExtractedEntities, Intent, IntentClassifier};
use crate::knowledge::KnowledgeBase;
use crate::{OrchestratorError, Result};

/// Inbound orchestrate request
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestrateRequest {
    pub user_id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub query: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub files: Option<Vec<String>>,
}

/// Outbound structured response
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationResponse {
    pub intent: String,
    pub confidence: f64,
    pub response_text: String,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_clarification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarifications: Option<Vec<AmbiguityItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ResponseComponent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<RetrievedDocument>>,
    pub service_used: String,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_chain: Option<ReasoningChain>,
}

/// Where a classified request gets dispatched
enum Route {
    Rag(RagMode),
    Detail,
    DirectChat { system_prompt: String },
}

/// Output of a handler before assembly
struct HandlerResult {
    response_text: String,
    components: Option<Vec<ResponseComponent>>,
    sources: Option<Vec<RetrievedDocument>>,
    service_used: String,
    /// New last-retrieved set to persist, when the handler produced one.
    retrieved_refs: Option<Vec<RetrievedRef>>,
    /// Position reference could not be resolved; ask the user to
    /// re-state instead of failing.
    needs_restate: bool,
}

/// The request coordinator
pub struct Orchestrator {
    llm: Arc<LlmGateway>,
    rag: Arc<RagPipeline>,
    detail: PropertyDetailHandler,
    store: Arc<dyn ConversationStore>,
    directory: Arc<dyn ServiceDirectory>,
    knowledge: KnowledgeBase,
    ambiguity: AmbiguityDetector,
    classifier: IntentClassifier,
    config: OrchestratorConfig,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        llm: Arc<LlmGateway>,
        rag: Arc<RagPipeline>,
        detail: PropertyDetailHandler,
        store: Arc<dyn ConversationStore>,
        directory: Arc<dyn ServiceDirectory>,
        knowledge: KnowledgeBase,
        config: OrchestratorConfig,
    ) -> Self {
        let classifier = IntentClassifier::new(llm.clone(), &config.chat_model);
        Self {
            llm,
            rag,
            detail,
            store,
            directory,
            knowledge,
            ambiguity: AmbiguityDetector::new(),
            classifier,
            config,
        }
    }

    /// Process one request end to end.
    pub async fn orchestrate(
        &self,
        request: OrchestrateRequest,
        include_reasoning: bool,
    ) -> Result<OrchestrationResponse> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let mut chain = ReasoningChain::new();

        // Stage 1: input validation
        if request.query.trim().is_empty() {
            return Err(OrchestratorError::input_invalid(
                "Bạn vui lòng nhập yêu cầu về bất động sản, ví dụ: \"Tìm căn hộ 2 phòng ngủ \
                 Quận 7 dưới 3 tỷ\".",
            ));
        }
        let (bounded, was_truncated) =
            crate::language::truncate_chars(&request.query, self.config.max_query_length);
        if was_truncated {
            warn!(%request_id, max = self.config.max_query_length, "query truncated");
        }
        let mut normalized = crate::language::strip_decorations(&bounded);
        chain.record(
            Thought::new(ThoughtStage::QueryAnalysis, "validated and normalized input", 0.95)
                .with_data(json!({
                    "chars": normalized.chars().count(),
                    "truncated": was_truncated,
                })),
        );

        // Stage 2: language detection
        let scripts = crate::language::detect_scripts(&normalized);
        if scripts.len() > 2 {
            normalized = crate::language::simplify_scripts(&normalized);
            chain.record(Thought::new(
                ThoughtStage::QueryAnalysis,
                "three or more scripts present, restricted text to Vietnamese and Latin",
                0.8,
            ));
        }
        let language = request
            .language
            .clone()
            .unwrap_or_else(|| crate::language::detect_language(&normalized).to_string());

        // Stage 3: conversation load
        let conversation_id = request
            .conversation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let snapshot = self
            .store
            .load_or_create(&request.user_id, &conversation_id)
            .await?;
        let history: Vec<Message> = snapshot
            .history
            .iter()
            .rev()
            .take(self.config.history_window)
            .rev()
            .cloned()
            .collect();

        // Stage 4: knowledge expansion
        let expansion = self.knowledge.expand(&normalized);
        chain.record(
            Thought::new(
                ThoughtStage::KnowledgeExpansion,
                if expansion.is_identity() {
                    "no domain phrases to expand"
                } else {
                    "expanded domain phrases"
                },
                0.9,
            )
            .with_data(json!({
                "expanded_terms": expansion.expanded_terms,
                "suggested_filters": expansion.suggested_filters,
            })),
        );

        // Stage 5: ambiguity detection
        let ambiguity = self.ambiguity.detect(&normalized);
        chain.record(
            Thought::new(
                ThoughtStage::AmbiguityCheck,
                format!("{} ambiguity item(s) detected", ambiguity.items.len()),
                if ambiguity.has_critical() { 0.5 } else { 0.9 },
            )
            .with_data(json!({ "items": ambiguity.items.len() })),
        );
        if ambiguity.has_critical() {
            let response_text = ambiguity
                .items
                .iter()
                .filter(|i| i.ambiguity_type.is_critical())
                .map(|i| i.clarifying_question.clone())
                .collect::<Vec<_>>()
                .join(" ");
            chain.conclude("critical ambiguity, asking for clarification");

            self.store
                .append_turn(
                    &request.user_id,
                    &conversation_id,
                    Message::user(request.query.clone()),
                    Message::assistant(response_text.clone()),
                    None,
                    self.config.history_window,
                )
                .await?;

            return Ok(OrchestrationResponse {
                intent: Intent::Unknown.as_str().to_string(),
                confidence: chain.overall_confidence.min(0.6),
                response_text,
                conversation_id,
                needs_clarification: Some(true),
                clarifications: Some(ambiguity.items),
                components: None,
                sources: None,
                service_used: "none".to_string(),
                execution_time_ms: started.elapsed().as_millis() as u64,
                reasoning_chain: include_reasoning.then_some(chain),
            });
        }

        // Stage 6: intent classification
        let classification = self.classifier.classify(&normalized, &history).await;
        chain.record(
            Thought::new(
                ThoughtStage::IntentClassification,
                format!("classified intent as {}", classification.intent.as_str()),
                classification.confidence,
            )
            .with_data(json!({
                "intent": classification.intent.as_str(),
                "from_fallback": classification.from_fallback,
                "entities": classification.entities,
            })),
        );

        // Stage 7: routing decision
        let route = self
            .route_for(classification.intent, &language, &mut chain)
            .await;

        // Stage 8: handler execution under the request deadline
        let remaining = self.config.deadline.saturating_sub(started.elapsed());
        let handler_future = self.execute(
            route,
            &normalized,
            &expansion.suggested_filters,
            &classification.entities,
            &history,
            &language,
            &snapshot.last_retrieved,
            ambiguity.has_ambiguity,
            request_id,
            &mut chain,
        );
        let timed = tokio::time::timeout(remaining, handler_future).await;
        let result = match timed {
            Ok(result) => result?,
            Err(_) => {
                warn!(%request_id, "request deadline exceeded during handler execution");
                return Err(OrchestratorError::Timeout {
                    partial_chain: Box::new(chain),
                });
            }
        };

        // Stage 9: state update (serialized per conversation inside the
        // store)
        self.store
            .append_turn(
                &request.user_id,
                &conversation_id,
                Message::user(request.query.clone()),
                Message::assistant(result.response_text.clone()),
                result.retrieved_refs.clone(),
                self.config.history_window,
            )
            .await?;

        // Stage 10: response assembly
        let confidence = chain.overall_confidence;
        chain.conclude(format!(
            "handled as {} via {}",
            classification.intent.as_str(),
            result.service_used
        ));
        info!(
            %request_id,
            intent = classification.intent.as_str(),
            service = %result.service_used,
            latency_ms = started.elapsed().as_millis() as u64,
            "request orchestrated"
        );

        Ok(OrchestrationResponse {
            intent: classification.intent.as_str().to_string(),
            confidence,
            response_text: result.response_text,
            conversation_id,
            needs_clarification: result.needs_restate.then_some(true),
            clarifications: None,
            components: result.components,
            sources: result.sources,
            service_used: result.service_used,
            execution_time_ms: started.elapsed().as_millis() as u64,
            reasoning_chain: include_reasoning.then_some(chain),
        })
    }

    /// Map an intent to a handler, degrading to direct chat when the
    /// needed downstream is unhealthy.
    async fn route_for(&self, intent: Intent, language: &str, chain: &mut ReasoningChain) -> Route {
        let wanted = match intent {
            Intent::Search => Some(("retrieval", Route::Rag(RagMode::Search))),
            Intent::Compare => Some(("retrieval", Route::Rag(RagMode::Compare))),
            Intent::InvestmentAdvice => {
                Some(("retrieval", Route::Rag(RagMode::InvestmentAdvice)))
            }
            Intent::LocationInsights => {
                Some(("retrieval", Route::Rag(RagMode::LocationInsights)))
            }
            Intent::PropertyDetail => Some(("retrieval", Route::Detail)),
            Intent::PriceAnalysis => Some((
                "llm",
                Route::DirectChat {
                    system_prompt: price_analysis_prompt(language),
                },
            )),
            Intent::LegalGuidance => Some((
                "llm",
                Route::DirectChat {
                    system_prompt: legal_prompt(language),
                },
            )),
            Intent::Chat | Intent::Unknown => None,
        };

        match wanted {
            Some((capability, route)) => {
                if self.directory.healthy(capability).await {
                    chain.record(Thought::new(
                        ThoughtStage::RoutingDecision,
                        format!("routing to {} handler", intent.as_str()),
                        0.9,
                    ));
                    route
                } else {
                    warn!(capability, "downstream unhealthy, degrading to chat handler");
                    chain.record(Thought::new(
                        ThoughtStage::RoutingDecision,
                        format!(
                            "{capability} service unhealthy, degrading to chat handler"
                        ),
                        0.5,
                    ));
                    Route::DirectChat {
                        system_prompt: degraded_chat_prompt(language),
                    }
                }
            }
            None => {
                chain.record(Thought::new(
                    ThoughtStage::RoutingDecision,
                    "routing to direct chat handler",
                    0.85,
                ));
                Route::DirectChat {
                    system_prompt: chat_prompt(language),
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        route: Route,
        query: &str,
        suggested_filters: &std::collections::HashMap<String, serde_json::Value>,
        entities: &ExtractedEntities,
        history: &[Message],
        language: &str,
        last_retrieved: &[RetrievedRef],
        ambiguous_hint: bool,
        request_id: Uuid,
        chain: &mut ReasoningChain,
    ) -> Result<HandlerResult> {
        match route {
            Route::Rag(mode) => {
                let filters = merge_filters(suggested_filters, entities);
                let mut rag_request = RagRequest::new(query)
                    .with_filters(filters)
                    .with_mode(mode)
                    .with_language(language)
                    .with_history(history.to_vec());
                rag_request.request_id = request_id;
                rag_request.ambiguous_hint = ambiguous_hint;

                match self.rag.run(rag_request).await {
                    Ok(response) => {
                        chain.thoughts.extend(response.chain.thoughts.clone());
                        chain.overall_confidence =
                            chain.overall_confidence.min(response.chain.overall_confidence);

                        let components = (mode == RagMode::Search
                            && !response.sources.is_empty())
                        .then(|| vec![ResponseComponent::carousel(response.sources.clone())]);
                        let retrieved_refs = Some(build_retrieved_refs(
                            &response.sources,
                            request_id,
                            self.config.last_retrieved_k,
                        ));

                        Ok(HandlerResult {
                            response_text: response.answer,
                            components,
                            sources: Some(response.sources),
                            service_used: "rag-pipeline".to_string(),
                            retrieved_refs,
                            needs_restate: false,
                        })
                    }
                    Err(error) => {
                        // Degrade to chat before surfacing a 503
                        warn!(error = %error, "rag pipeline failed, degrading to chat handler");
                        chain.record(Thought::new(
                            ThoughtStage::RoutingDecision,
                            "retrieval pipeline failed, degrading to chat handler",
                            0.4,
                        ));
                        self.direct_chat(degraded_chat_prompt(language), query, history, chain)
                            .await
                    }
                }
            }
            Route::Detail => match self.detail.handle(query, last_retrieved).await {
                Ok(result) => {
                    chain.record(
                        Thought::new(
                            ThoughtStage::Retrieval,
                            format!("resolved property {}", result.property_id),
                            0.9,
                        )
                        .with_data(json!({ "property_id": result.property_id })),
                    );
                    let retrieved_refs = Some(vec![RetrievedRef {
                        position: 1,
                        property_id: result.property_id.clone(),
                        title: result.title.clone(),
                        turn_id: request_id,
                    }]);
                    Ok(HandlerResult {
                        response_text: detail_text(&result.title, language),
                        components: Some(vec![result.component]),
                        sources: None,
                        service_used: "property-detail".to_string(),
                        retrieved_refs,
                        needs_restate: false,
                    })
                }
                Err(OrchestratorError::InputInvalid { message }) => {
                    // Position out of range: ask to re-state, not a 4xx
                    chain.record(Thought::new(
                        ThoughtStage::Retrieval,
                        "positional reference did not resolve",
                        0.5,
                    ));
                    Ok(HandlerResult {
                        response_text: message,
                        components: None,
                        sources: None,
                        service_used: "property-detail".to_string(),
                        retrieved_refs: None,
                        needs_restate: true,
                    })
                }
                Err(other) => Err(other),
            },
            Route::DirectChat { system_prompt } => {
                self.direct_chat(system_prompt, query, history, chain).await
            }
        }
    }

    async fn direct_chat(
        &self,
        system_prompt: String,
        query: &str,
        history: &[Message],
        chain: &mut ReasoningChain,
    ) -> Result<HandlerResult> {
        let mut messages = vec![Message::system(system_prompt)];
        messages.extend(history.iter().cloned());
        messages.push(Message::user(query.to_string()));

        let request = ChatRequest::new(&self.config.chat_model, messages).with_temperature(0.7);
        let response = self.llm.chat(request).await.map_err(|error| {
            OrchestratorError::ServiceDegraded {
                detail: error.to_string(),
            }
        })?;

        chain.record(
            Thought::new(ThoughtStage::Generation, "answered via direct chat", 0.8)
                .with_data(json!({ "model": response.model })),
        );

        Ok(HandlerResult {
            response_text: response.content,
            components: None,
            sources: None,
            service_used: "llm-direct".to_string(),
            retrieved_refs: None,
            needs_restate: false,
        })
    }
}

/// Merge knowledge-base filter suggestions with extracted entities into
/// the retrieval filter set. Entities win on conflict, being closer to
/// the user's words.
fn merge_filters(
    suggested: &std::collections::HashMap<String, serde_json::Value>,
    entities: &ExtractedEntities,
) -> SearchFilters {
    let mut filters =
        SearchFilters::from_value(serde_json::to_value(suggested).unwrap_or_default())
            .unwrap_or_default();

    if let Some(bedrooms) = entities.bedrooms {
        filters.bedrooms = Some(bedrooms);
    }
    if let Some(district) = &entities.district {
        filters.district = Some(district.clone());
    }
    if let Some(city) = &entities.city {
        filters.city = Some(city.clone());
    }
    if entities.price_min.is_some() || entities.price_max.is_some() {
        filters.price = Some(RangeFilter {
            gte: entities.price_min,
            lte: entities.price_max,
        });
    }
    if !entities.features.is_empty() {
        let mut features = filters.features;
        for feature in &entities.features {
            if !features.contains(feature) {
                features.push(feature.clone());
            }
        }
        filters.features = features;
    }
    filters
}

fn detail_text(title: &str, language: &str) -> String {
    if language.starts_with("vi") {
        format!("Đây là thông tin chi tiết về {title}.")
    } else {
        format!("Here are the details for {title}.")
    }
}

fn chat_prompt(language: &str) -> String {
    format!(
        "You are a friendly real-estate platform assistant. Answer questions \
         conversationally and steer users toward property search when it \
         helps. Respond in {}.",
        lang_name(language)
    )
}

fn degraded_chat_prompt(language: &str) -> String {
    format!(
        "You are a real-estate platform assistant. Property search is \
         temporarily unavailable; apologize briefly, answer what you can \
         from general knowledge, and invite the user to retry shortly. \
         Respond in {}.",
        lang_name(language)
    )
}

fn price_analysis_prompt(language: &str) -> String {
    format!(
        "You are a real-estate pricing analyst. Give a reasoned price \
         assessment with the assumptions stated, and be clear it is an \
         estimate, not a valuation. Respond in {}.",
        lang_name(language)
    )
}

fn legal_prompt(language: &str) -> String {
    format!(
        "You are a real-estate assistant answering general questions about \
         Vietnamese property paperwork and transactions. Be clear you are \
         not giving legal advice. Respond in {}.",
        lang_name(language)
    )
}

fn lang_name(language: &str) -> &str {
    if language.starts_with("vi") {
        "Vietnamese"
    } else {
        "the user's language"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entities_override_knowledge_suggestions() {
        let suggested = std::collections::HashMap::from([(
            "district".to_string(),
            json!("Quận 2"),
        )]);
        let entities = ExtractedEntities {
            district: Some("Quận 7".to_string()),
            bedrooms: Some(2),
            price_max: Some(3_000_000_000.0),
            ..Default::default()
        };

        let filters = merge_filters(&suggested, &entities);
        assert_eq!(filters.district.as_deref(), Some("Quận 7"));
        assert_eq!(filters.bedrooms, Some(2));
        assert_eq!(filters.price.unwrap().lte, Some(3_000_000_000.0));
    }

    #[test]
    fn suggested_filters_survive_when_no_entity_conflicts() {
        let suggested = std::collections::HashMap::from([
            ("district".to_string(), json!("Quận 2")),
            ("features".to_string(), json!(["river view"])),
        ]);
        let filters = merge_filters(&suggested, &ExtractedEntities::default());
        assert_eq!(filters.district.as_deref(), Some("Quận 2"));
        assert_eq!(filters.features, vec!["river view".to_string()]);
    }
}
