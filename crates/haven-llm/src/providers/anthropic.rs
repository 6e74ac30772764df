//! Anthropic provider (messages API wire format)

use async_trait::async_trait;
use haven_types::Role;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::{classify_status, classify_transport_error, parse_retry_after, ProviderSettings};
use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ModelInfo, Usage};
use crate::{GatewayError, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: Vec<WireContentBlock>,
    model: String,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// Anthropic API provider.
///
/// The messages API takes the system prompt as a top-level field, so
/// system messages are folded out of the conversation before dispatch.
pub struct AnthropicProvider {
    settings: ProviderSettings,
    timeout: Duration,
}

impl AnthropicProvider {
    pub fn new(settings: ProviderSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, model: &str, request: &ChatRequest) -> Result<ChatResponse> {
        debug!(model, request_id = %request.request_id, "anthropic chat call");

        let system = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");

        let messages = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage {
                role: match m.role {
                    Role::Assistant => "assistant".to_string(),
                    _ => "user".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();

        let wire = WireRequest {
            model,
            messages,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: (!system.is_empty()).then_some(system),
            temperature: request.temperature,
        };

        let url = format!("{}/v1/messages", self.settings.base_url);
        let mut http_request = self
            .settings
            .client
            .post(&url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&wire);
        if let Some(key) = &self.settings.api_key {
            http_request = http_request.header("x-api-key", key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| classify_transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, body));
        }

        let wire_response: WireResponse =
            response.json().await.map_err(|e| GatewayError::Provider {
                status: status.as_u16(),
                message: format!("unparseable response body: {e}"),
            })?;

        let content = wire_response
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        let usage = Usage {
            prompt_tokens: wire_response.usage.input_tokens,
            completion_tokens: wire_response.usage.output_tokens,
            total_tokens: wire_response.usage.input_tokens + wire_response.usage.output_tokens,
        };

        Ok(ChatResponse {
            id: Uuid::new_v4(),
            request_id: request.request_id,
            model: wire_response.model,
            content,
            finish_reason: wire_response
                .stop_reason
                .unwrap_or_else(|| "end_turn".to_string()),
            usage,
            provider: "anthropic".to_string(),
            latency_ms: 0,
        })
    }

    async fn embed(&self, _model: &str, _inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(GatewayError::BadRequest(
            "anthropic provider does not serve embeddings".to_string(),
        ))
    }

    fn models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "claude-3-haiku".to_string(),
            provider: "anthropic".to_string(),
            supports_embeddings: false,
        }]
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("base_url", &self.settings.base_url)
            .field("api_key", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_types::Message;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn system_messages_fold_into_top_level_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(serde_json::json!({
                "system": "You are a property assistant."
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg-1",
                "model": "claude-3-haiku",
                "content": [{"type": "text", "text": "Chào bạn!"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 10, "output_tokens": 4}
            })))
            .mount(&server)
            .await;

        let settings =
            ProviderSettings::new(server.uri(), reqwest::Client::new()).with_api_key("key");
        let provider = AnthropicProvider::new(settings, Duration::from_secs(5));

        let request = ChatRequest::new(
            "primary-chat",
            vec![
                Message::system("You are a property assistant."),
                Message::user("chào"),
            ],
        );
        let response = provider.chat("claude-3-haiku", &request).await.unwrap();
        assert_eq!(response.content, "Chào bạn!");
        assert_eq!(response.usage.total_tokens, 14);
    }

    #[tokio::test]
    async fn embeddings_are_rejected_as_bad_request() {
        let settings =
            ProviderSettings::new("http://localhost:1", reqwest::Client::new());
        let provider = AnthropicProvider::new(settings, Duration::from_secs(5));
        let error = provider
            .embed("claude-3-haiku", &["text".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(error, GatewayError::BadRequest(_)));
    }
}
