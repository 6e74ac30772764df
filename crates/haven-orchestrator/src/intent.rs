//! Intent classification
//!
//! An LLM call with a few-shot system prompt returning strict JSON,
//! parsed through the defensive ladder. When the model output is
//! unparseable the classifier falls back to a deterministic keyword
//! rule: any property-domain keyword means `search`, a bare greeting
//! means `chat`, anything else is `unknown`.

use haven_llm::{ChatRequest, LlmGateway};
use haven_types::{lenient_json, Message};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// The closed intent enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Search,
    PropertyDetail,
    Compare,
    PriceAnalysis,
    InvestmentAdvice,
    LocationInsights,
    LegalGuidance,
    Chat,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Search => "search",
            Intent::PropertyDetail => "property_detail",
            Intent::Compare => "compare",
            Intent::PriceAnalysis => "price_analysis",
            Intent::InvestmentAdvice => "investment_advice",
            Intent::LocationInsights => "location_insights",
            Intent::LegalGuidance => "legal_guidance",
            Intent::Chat => "chat",
            Intent::Unknown => "unknown",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "search" => Some(Intent::Search),
            "property_detail" => Some(Intent::PropertyDetail),
            "compare" => Some(Intent::Compare),
            "price_analysis" => Some(Intent::PriceAnalysis),
            "investment_advice" => Some(Intent::InvestmentAdvice),
            "location_insights" => Some(Intent::LocationInsights),
            "legal_guidance" => Some(Intent::LegalGuidance),
            "chat" => Some(Intent::Chat),
            "unknown" => Some(Intent::Unknown),
            _ => None,
        }
    }
}

/// Entities pulled out of the query alongside the intent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedEntities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

/// Classification result
#[derive(Debug, Clone)]
pub struct IntentClassification {
    pub intent: Intent,
    pub confidence: f64,
    pub entities: ExtractedEntities,
    /// True when the keyword fallback produced the result.
    pub from_fallback: bool,
}

const DOMAIN_KEYWORDS: &[&str] = &[
    "căn hộ", "chung cư", "nhà", "biệt thự", "đất", "phòng ngủ", "quận", "giá", "thuê", "mua",
    "bán", "apartment", "house", "villa", "property", "bedroom", "district", "rent", "buy",
];

const GREETINGS: &[&str] = &[
    "xin chào", "chào bạn", "chào", "hello", "hi", "hey", "good morning", "alo",
];

fn system_prompt() -> String {
    r#"Classify a real-estate platform request into exactly one intent:
search, property_detail, compare, price_analysis, investment_advice,
location_insights, legal_guidance, chat, unknown.

Reply as JSON only:
{"intent": "...", "confidence": 0.0, "entities": {"price_min": null,
"price_max": null, "bedrooms": null, "district": null, "city": null,
"features": []}}

Examples:
"Tìm căn hộ 2 phòng ngủ Quận 7 dưới 3 tỷ" ->
{"intent": "search", "confidence": 0.95, "entities": {"price_max": 3000000000,
"bedrooms": 2, "district": "Quận 7", "features": []}}
"xem căn số 2" ->
{"intent": "property_detail", "confidence": 0.9, "entities": {"features": []}}
"so sánh hai căn này giúp tôi" ->
{"intent": "compare", "confidence": 0.9, "entities": {"features": []}}
"căn này giá bao nhiêu là hợp lý" ->
{"intent": "price_analysis", "confidence": 0.85, "entities": {"features": []}}
"thủ tục sang tên sổ hồng thế nào" ->
{"intent": "legal_guidance", "confidence": 0.9, "entities": {"features": []}}
"chào bạn" ->
{"intent": "chat", "confidence": 0.95, "entities": {"features": []}}"#
        .to_string()
}

/// LLM-backed classifier with a deterministic fallback
pub struct IntentClassifier {
    llm: Arc<LlmGateway>,
    model: String,
}

impl IntentClassifier {
    pub fn new(llm: Arc<LlmGateway>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    pub async fn classify(&self, query: &str, history: &[Message]) -> IntentClassification {
        let mut messages = vec![Message::system(system_prompt())];
        messages.extend(history.iter().cloned());
        messages.push(Message::user(query.to_string()));

        let request = ChatRequest::new(&self.model, messages).with_temperature(0.0);
        match self.llm.chat(request).await {
            Ok(response) => match Self::parse_reply(&response.content) {
                Some(classification) => classification,
                None => {
                    warn!("intent reply unparseable, using keyword fallback");
                    Self::keyword_fallback(query)
                }
            },
            Err(error) => {
                warn!(error = %error, "intent classification call failed, using keyword fallback");
                Self::keyword_fallback(query)
            }
        }
    }

    fn parse_reply(reply: &str) -> Option<IntentClassification> {
        let value = lenient_json(reply)?;
        let intent = Intent::parse(value.get("intent")?.as_str()?)?;
        let confidence = value
            .get("confidence")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.5)
            .clamp(0.0, 1.0);
        let entities = value
            .get("entities")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        debug!(intent = intent.as_str(), confidence, "intent classified");
        Some(IntentClassification {
            intent,
            confidence,
            entities,
            from_fallback: false,
        })
    }

    /// Deterministic rule used when the model output cannot be parsed.
    pub fn keyword_fallback(query: &str) -> IntentClassification {
        let lowered = query.to_lowercase();
        let trimmed = lowered.trim();

        let is_greeting = GREETINGS
            .iter()
            .any(|g| trimmed == *g || trimmed.starts_with(&format!("{g} ")));
        let (intent, confidence) = if is_greeting {
            (Intent::Chat, 0.7)
        } else if DOMAIN_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            (Intent::Search, 0.6)
        } else {
            (Intent::Unknown, 0.3)
        };

        IntentClassification {
            intent,
            confidence,
            entities: ExtractedEntities::default(),
            from_fallback: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_classification_reply() {
        let reply = "```json\n{\"intent\": \"search\", \"confidence\": 0.92, \"entities\": {\"bedrooms\": 2, \"district\": \"Quận 7\", \"price_max\": 3000000000.0, \"features\": []}}\n```";
        let classification = IntentClassifier::parse_reply(reply).unwrap();
        assert_eq!(classification.intent, Intent::Search);
        assert_eq!(classification.entities.bedrooms, Some(2));
        assert_eq!(classification.entities.district.as_deref(), Some("Quận 7"));
    }

    #[test]
    fn out_of_enumeration_intent_fails_parsing() {
        let reply = "{\"intent\": \"world_domination\", \"confidence\": 1.0}";
        assert!(IntentClassifier::parse_reply(reply).is_none());
    }

    #[test]
    fn fallback_maps_domain_keywords_to_search() {
        let classification = IntentClassifier::keyword_fallback("căn hộ quận 7 có gì hay");
        assert_eq!(classification.intent, Intent::Search);
        assert!(classification.from_fallback);
    }

    #[test]
    fn fallback_maps_bare_greetings_to_chat() {
        let classification = IntentClassifier::keyword_fallback("xin chào");
        assert_eq!(classification.intent, Intent::Chat);
    }

    #[test]
    fn fallback_maps_everything_else_to_unknown() {
        let classification = IntentClassifier::keyword_fallback("what is the weather like");
        assert_eq!(classification.intent, Intent::Unknown);
    }
}
