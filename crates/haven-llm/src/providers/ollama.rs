//! Ollama provider for local models

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::{classify_status, classify_transport_error, ProviderSettings};
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
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    model: String,
    message: WireResponseMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
    #[serde(default)]
    done_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct WireEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Local Ollama provider. No authentication; last in every fallback
/// chain because it always answers, just slowly.
pub struct OllamaProvider {
    settings: ProviderSettings,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(settings: ProviderSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, model: &str, request: &ChatRequest) -> Result<ChatResponse> {
        debug!(model, request_id = %request.request_id, "ollama chat call");

        let options = request.temperature.map(|t| serde_json::json!({
            "temperature": t,
        }));

        let wire = WireChatRequest {
            model,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream: false,
            options,
        };

        let url = format!("{}/api/chat", self.settings.base_url);
        let response = self
            .settings
            .client
            .post(&url)
            .json(&wire)
            .send()
            .await
            .map_err(|e| classify_transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, None, body));
        }

        let wire_response: WireChatResponse =
            response.json().await.map_err(|e| GatewayError::Provider {
                status: status.as_u16(),
                message: format!("unparseable response body: {e}"),
            })?;

        Ok(ChatResponse {
            id: Uuid::new_v4(),
            request_id: request.request_id,
            model: wire_response.model,
            content: wire_response.message.content,
            finish_reason: wire_response
                .done_reason
                .unwrap_or_else(|| "stop".to_string()),
            usage: Usage {
                prompt_tokens: wire_response.prompt_eval_count,
                completion_tokens: wire_response.eval_count,
                total_tokens: wire_response.prompt_eval_count + wire_response.eval_count,
            },
            provider: "ollama".to_string(),
            latency_ms: 0,
        })
    }

    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        // Ollama embeds one prompt per call
        let url = format!("{}/api/embeddings", self.settings.base_url);
        let mut vectors = Vec::with_capacity(inputs.len());

        for input in inputs {
            let wire = WireEmbeddingRequest {
                model,
                prompt: input,
            };
            let response = self
                .settings
                .client
                .post(&url)
                .json(&wire)
                .send()
                .await
                .map_err(|e| classify_transport_error(e, self.timeout))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(classify_status(status, None, body));
            }

            let wire_response: WireEmbeddingResponse =
                response.json().await.map_err(|e| GatewayError::Provider {
                    status: status.as_u16(),
                    message: format!("unparseable response body: {e}"),
                })?;
            vectors.push(wire_response.embedding);
        }

        Ok(vectors)
    }

    fn models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "llama3.2".to_string(),
            provider: "ollama".to_string(),
            supports_embeddings: true,
        }]
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

impl std::fmt::Debug for OllamaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaProvider")
            .field("base_url", &self.settings.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_types::Message;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn chat_parses_ollama_wire_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama3.2",
                "message": {"role": "assistant", "content": "hello"},
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 9,
                "eval_count": 2
            })))
            .mount(&server)
            .await;

        let settings = ProviderSettings::new(server.uri(), reqwest::Client::new());
        let provider = OllamaProvider::new(settings, Duration::from_secs(5));
        let request = ChatRequest::new("primary-chat", vec![Message::user("hi")]);

        let response = provider.chat("llama3.2", &request).await.unwrap();
        assert_eq!(response.content, "hello");
        assert_eq!(response.usage.total_tokens, 11);
    }

    #[tokio::test]
    async fn embed_issues_one_call_per_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": [0.5, 0.5]
            })))
            .expect(2)
            .mount(&server)
            .await;

        let settings = ProviderSettings::new(server.uri(), reqwest::Client::new());
        let provider = OllamaProvider::new(settings, Duration::from_secs(5));
        let vectors = provider
            .embed("llama3.2", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
    }
}
