//! OpenAI provider (chat completions + embeddings wire format)

use async_trait::async_trait;
use haven_types::Role;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::{classify_status, classify_transport_error, parse_retry_after, ProviderSettings};
use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ModelInfo, Usage};
use crate::{GatewayError, Result};

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: WireUsage,
    model: String,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct WireEmbeddingResponse {
    data: Vec<WireEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct WireEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// OpenAI API provider
pub struct OpenAiProvider {
    settings: ProviderSettings,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(settings: ProviderSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }

    fn role_name(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        payload: &impl Serialize,
    ) -> Result<T> {
        let url = format!("{}/{}", self.settings.base_url, endpoint);
        let mut request = self.settings.client.post(&url).json(payload);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Provider {
                status: status.as_u16(),
                message: format!("unparseable response body: {e}"),
            })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, model: &str, request: &ChatRequest) -> Result<ChatResponse> {
        debug!(model, request_id = %request.request_id, "openai chat call");

        let wire = WireChatRequest {
            model,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: Self::role_name(m.role).to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools: request.tools.as_ref(),
        };

        let response: WireChatResponse = self.post_json("chat/completions", &wire).await?;
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            GatewayError::Provider {
                status: 200,
                message: "no completion choices returned".to_string(),
            }
        })?;

        Ok(ChatResponse {
            id: Uuid::new_v4(),
            request_id: request.request_id,
            model: response.model,
            content: choice.message.content,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage: Usage {
                prompt_tokens: response.usage.prompt_tokens,
                completion_tokens: response.usage.completion_tokens,
                total_tokens: response.usage.total_tokens,
            },
            provider: "openai".to_string(),
            latency_ms: 0,
        })
    }

    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let wire = WireEmbeddingRequest { model, input: inputs };
        let response: WireEmbeddingResponse = self.post_json("embeddings", &wire).await?;

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "gpt-4o-mini".to_string(),
                provider: "openai".to_string(),
                supports_embeddings: false,
            },
            ModelInfo {
                id: "text-embedding-ada-002".to_string(),
                provider: "openai".to_string(),
                supports_embeddings: true,
            },
        ]
    }

    fn name(&self) -> &str {
        "openai"
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.settings.base_url)
            .field("api_key", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_types::Message;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        let settings =
            ProviderSettings::new(server.uri(), reqwest::Client::new()).with_api_key("test-key");
        OpenAiProvider::new(settings, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn chat_parses_openai_wire_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "model": "gpt-4o-mini",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Xin chào!"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = ChatRequest::new("primary-chat", vec![Message::user("chào")]);
        let response = provider.chat("gpt-4o-mini", &request).await.unwrap();

        assert_eq!(response.content, "Xin chào!");
        assert_eq!(response.usage.total_tokens, 15);
        assert_eq!(response.finish_reason, "stop");
    }

    #[tokio::test]
    async fn rate_limit_maps_to_rate_limited_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429).insert_header("retry-after", "3"),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = ChatRequest::new("primary-chat", vec![Message::user("hi")]);
        let error = provider.chat("gpt-4o-mini", &request).await.unwrap_err();
        assert!(matches!(
            error,
            GatewayError::RateLimited {
                retry_after_ms: Some(3000)
            }
        ));
    }

    #[tokio::test]
    async fn client_error_maps_to_bad_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("model not found"))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = ChatRequest::new("primary-chat", vec![Message::user("hi")]);
        let error = provider.chat("bogus", &request).await.unwrap_err();
        assert!(matches!(error, GatewayError::BadRequest(_)));
    }

    #[tokio::test]
    async fn embeddings_return_in_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"embedding": [0.2, 0.2], "index": 1},
                    {"embedding": [0.1, 0.1], "index": 0}
                ],
                "usage": {"prompt_tokens": 4, "total_tokens": 4}
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let vectors = provider
            .embed(
                "text-embedding-ada-002",
                &["a".to_string(), "b".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(vectors[0], vec![0.1, 0.1]);
        assert_eq!(vectors[1], vec![0.2, 0.2]);
    }
}
