//! Core LLM provider trait and gateway contract types

use async_trait::async_trait;
use haven_types::Message;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

/// Request for a chat completion.
///
/// `model` is a logical tag (for example `primary-chat`); the gateway
/// resolves it to concrete provider routes. Fallback never changes
/// request semantics beyond the model identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub request_id: Uuid,
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<serde_json::Value>,
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            tools: None,
            stream: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }
}

/// Token usage for a completion. Always non-negative by construction.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response from a chat completion.
///
/// `model` names the concrete provider/model that actually answered; it
/// differs from the requested logical tag and records fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub model: String,
    pub content: String,
    pub finish_reason: String,
    pub usage: Usage,
    pub provider: String,
    pub latency_ms: u64,
}

/// Descriptor of one model a provider can serve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    pub supports_embeddings: bool,
}

/// Trait implemented by every downstream LLM provider.
///
/// The concrete `model` name is supplied by the gateway after route
/// resolution; providers never see logical tags.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a chat completion with the given concrete model.
    async fn chat(&self, model: &str, request: &ChatRequest) -> Result<ChatResponse>;

    /// Generate embeddings for each input text.
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Models this provider serves.
    fn models(&self) -> Vec<ModelInfo>;

    /// Provider name used in routing tables and breaker keys.
    fn name(&self) -> &str;

    /// Cheap liveness check; providers may override.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
