//! Reasoning chain attached to orchestrated responses
//!
//! Every stage of request processing appends a [`Thought`]; the completed
//! chain is immutable once the response is returned and travels with it
//! for observability.

use serde::{Deserialize, Serialize};

/// Processing stage that produced a thought
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtStage {
    QueryAnalysis,
    KnowledgeExpansion,
    AmbiguityCheck,
    IntentClassification,
    RoutingDecision,
    Retrieval,
    Grading,
    Generation,
    Reflection,
}

/// One step of reasoning recorded during request processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thought {
    pub stage: ThoughtStage,
    pub thought: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl Thought {
    pub fn new(stage: ThoughtStage, thought: impl Into<String>, confidence: f64) -> Self {
        Self {
            stage,
            thought: thought.into(),
            data: serde_json::Value::Null,
            confidence: confidence.clamp(0.0, 1.0),
            latency_ms: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Ordered record of the reasoning performed for one request.
///
/// Thoughts are preserved in append order; `overall_confidence` is the
/// minimum stage confidence observed, so one weak stage caps the whole
/// chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasoningChain {
    pub thoughts: Vec<Thought>,
    pub overall_confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_conclusion: Option<String>,
}

impl ReasoningChain {
    pub fn new() -> Self {
        Self {
            thoughts: Vec::new(),
            overall_confidence: 1.0,
            final_conclusion: None,
        }
    }

    /// Append a thought, folding its confidence into the chain total.
    pub fn record(&mut self, thought: Thought) {
        self.overall_confidence = self.overall_confidence.min(thought.confidence);
        self.thoughts.push(thought);
    }

    pub fn conclude(&mut self, conclusion: impl Into<String>) {
        self.final_conclusion = Some(conclusion.into());
    }

    pub fn is_empty(&self) -> bool {
        self.thoughts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.thoughts.len()
    }

    /// Last thought recorded for a given stage, if any.
    pub fn last_for_stage(&self, stage: ThoughtStage) -> Option<&Thought> {
        self.thoughts.iter().rev().find(|t| t.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_preserves_append_order() {
        let mut chain = ReasoningChain::new();
        chain.record(Thought::new(ThoughtStage::QueryAnalysis, "first", 0.9));
        chain.record(Thought::new(ThoughtStage::Retrieval, "second", 0.8));
        chain.record(Thought::new(ThoughtStage::Generation, "third", 0.95));

        let stages: Vec<_> = chain.thoughts.iter().map(|t| t.stage).collect();
        assert_eq!(
            stages,
            vec![
                ThoughtStage::QueryAnalysis,
                ThoughtStage::Retrieval,
                ThoughtStage::Generation
            ]
        );
    }

    #[test]
    fn overall_confidence_is_minimum_of_stages() {
        let mut chain = ReasoningChain::new();
        chain.record(Thought::new(ThoughtStage::QueryAnalysis, "ok", 0.9));
        chain.record(Thought::new(ThoughtStage::AmbiguityCheck, "vague", 0.4));
        chain.record(Thought::new(ThoughtStage::Generation, "fine", 0.8));
        assert_eq!(chain.overall_confidence, 0.4);
    }

    #[test]
    fn confidence_is_clamped_to_unit_interval() {
        let thought = Thought::new(ThoughtStage::Grading, "overshoot", 1.7);
        assert_eq!(thought.confidence, 1.0);
        let thought = Thought::new(ThoughtStage::Grading, "undershoot", -0.3);
        assert_eq!(thought.confidence, 0.0);
    }

    #[test]
    fn stage_names_serialize_snake_case() {
        let json = serde_json::to_value(ThoughtStage::IntentClassification).unwrap();
        assert_eq!(json, "intent_classification");
    }
}
