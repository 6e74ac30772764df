//! OpenAI-compatible HTTP surface of the gateway

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use haven_types::Message;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::gateway::LlmGateway;
use crate::provider::ChatRequest;
use crate::GatewayError;

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            GatewayError::BadRequest(_) | GatewayError::UnknownModel(_) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            GatewayError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            GatewayError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            GatewayError::ProviderUnavailable { .. } | GatewayError::CircuitOpen { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "provider_unavailable")
            }
            GatewayError::Network(_) | GatewayError::Provider { .. } => {
                (StatusCode::BAD_GATEWAY, "upstream_error")
            }
            GatewayError::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
            }
        };
        let body = json!({ "error": { "type": kind, "message": self.to_string() } });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionBody {
    model: String,
    messages: Vec<Message>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    stream: bool,
    #[serde(default)]
    tools: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct EmbeddingBody {
    model: String,
    input: EmbeddingInput,
}

/// Build the gateway router over a shared gateway instance.
pub fn router(gateway: Arc<LlmGateway>) -> Router {
    Router::new()
        .route("/chat/completions", post(chat_completions))
        .route("/embeddings", post(embeddings))
        .route("/models", get(models))
        .route("/health", get(health))
        .route("/info", get(info))
        .with_state(gateway)
}

async fn chat_completions(
    State(gateway): State<Arc<LlmGateway>>,
    Json(body): Json<ChatCompletionBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let requested_model = body.model.clone();
    let mut request = ChatRequest::new(body.model, body.messages);
    request.temperature = body.temperature;
    request.max_tokens = body.max_tokens;
    request.stream = body.stream;
    request.tools = body.tools;

    let response = gateway.chat(request).await?;

    Ok(Json(json!({
        "id": format!("chatcmpl-{}", response.id),
        "object": "chat.completion",
        "created": chrono::Utc::now().timestamp(),
        "model": requested_model,
        "model_actual": response.model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": response.content },
            "finish_reason": response.finish_reason,
        }],
        "usage": {
            "prompt_tokens": response.usage.prompt_tokens,
            "completion_tokens": response.usage.completion_tokens,
            "total_tokens": response.usage.total_tokens,
        },
    })))
}

async fn embeddings(
    State(gateway): State<Arc<LlmGateway>>,
    Json(body): Json<EmbeddingBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let inputs = match body.input {
        EmbeddingInput::Single(text) => vec![text],
        EmbeddingInput::Batch(texts) => texts,
    };

    let vectors = gateway.embed(&body.model, &inputs).await?;
    let data: Vec<_> = vectors
        .into_iter()
        .enumerate()
        .map(|(index, embedding)| json!({ "embedding": embedding, "index": index }))
        .collect();

    Ok(Json(json!({
        "object": "list",
        "data": data,
        "model": body.model,
        "usage": { "prompt_tokens": 0, "total_tokens": 0 },
    })))
}

async fn models(State(gateway): State<Arc<LlmGateway>>) -> impl IntoResponse {
    Json(json!({
        "models": gateway.list_models(),
        "providers": gateway.provider_models(),
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn info(State(gateway): State<Arc<LlmGateway>>) -> impl IntoResponse {
    let routes: Vec<_> = gateway
        .route_stats()
        .into_iter()
        .map(|(route, stats)| {
            json!({
                "route": route,
                "state": stats.state,
                "consecutive_failures": stats.consecutive_failures,
                "total_successes": stats.total_successes,
                "total_failures": stats.total_failures,
            })
        })
        .collect();
    Json(json!({
        "service": "haven-llm-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "routes": routes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::config::GatewayConfig;
    use crate::mock::MockLlmProvider;
    use crate::retry::RetryPolicy;
    use crate::routing::{ModelRoute, RoutingTable};
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_gateway() -> Arc<LlmGateway> {
        let mut routing = RoutingTable::new();
        routing.set(
            "primary-chat",
            vec![
                ModelRoute::new("primary", "m1"),
                ModelRoute::new("backup", "m2"),
            ],
        );
        let mut gateway = LlmGateway::new(GatewayConfig {
            routing,
            retry: RetryPolicy {
                initial_delay: Duration::from_millis(1),
                multiplier: 2.0,
                max_delay: Duration::from_millis(2),
                max_attempts: 2,
            },
            breaker: CircuitBreakerConfig::default(),
            call_timeout: Duration::from_secs(5),
        });
        gateway.register_provider(Arc::new(
            MockLlmProvider::named("primary").always_rate_limited(),
        ));
        gateway.register_provider(Arc::new(
            MockLlmProvider::named("backup").with_reply("served by backup"),
        ));
        Arc::new(gateway)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn chat_completions_reports_model_actual_after_fallback() {
        let app = router(test_gateway());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chat/completions")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({
                            "model": "primary-chat",
                            "messages": [{"role": "user", "content": "hello"}]
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["model"], "primary-chat");
        assert_eq!(body["model_actual"], "backup/m2");
        assert_eq!(
            body["choices"][0]["message"]["content"],
            "served by backup"
        );
    }

    #[tokio::test]
    async fn unknown_model_tag_is_a_bad_request() {
        let app = router(test_gateway());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chat/completions")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({
                            "model": "no-such-tag",
                            "messages": [{"role": "user", "content": "hello"}]
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn embeddings_accept_single_string_input() {
        let mut routing = RoutingTable::new();
        routing.set("primary-embed", vec![ModelRoute::new("embedder", "e1")]);
        let mut gateway = LlmGateway::new(GatewayConfig {
            routing,
            ..GatewayConfig::default()
        });
        gateway.register_provider(Arc::new(MockLlmProvider::named("embedder")));

        let app = router(Arc::new(gateway));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/embeddings")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({"model": "primary-embed", "input": "xin chào"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"][0]["index"], 0);
        assert!(body["data"][0]["embedding"].is_array());
    }
}
