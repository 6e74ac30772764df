//! HTTP surface of the orchestrator

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

use crate::orchestrator::{OrchestrateRequest, Orchestrator};
use crate::OrchestratorError;

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        match self {
            OrchestratorError::InputInvalid { message } => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "intent": "unknown",
                    "confidence": 0.0,
                    "response_text": message,
                    "service_used": "none",
                })),
            )
                .into_response(),
            OrchestratorError::Timeout { partial_chain } => (
                StatusCode::GATEWAY_TIMEOUT,
                Json(json!({
                    "error": "timeout",
                    "response_text": "Yêu cầu mất quá nhiều thời gian, bạn vui lòng thử lại.",
                    "reasoning_chain": *partial_chain,
                })),
            )
                .into_response(),
            OrchestratorError::ServiceDegraded { detail } => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "service_degraded",
                    "response_text": "Hệ thống đang quá tải, bạn vui lòng thử lại sau ít phút.",
                    "detail": detail,
                })),
            )
                .into_response(),
            OrchestratorError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "not_found",
                    "response_text": "Không tìm thấy thông tin bạn yêu cầu.",
                    "resource": resource,
                })),
            )
                .into_response(),
            OrchestratorError::Store(detail) | OrchestratorError::Internal(detail) => {
                tracing::error!(detail, "internal orchestrator error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "internal_error",
                        "response_text": "Đã có lỗi xảy ra, bạn vui lòng thử lại.",
                    })),
                )
                    .into_response()
            }
        }
    }
}

/// Build the orchestrator router.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/orchestrate", post(orchestrate))
        .route("/orchestrate/v2", post(orchestrate_v2))
        .route("/health", get(health))
        .route("/info", get(info))
        .with_state(orchestrator)
}

fn wants_reasoning(request: &OrchestrateRequest) -> bool {
    request
        .metadata
        .as_ref()
        .and_then(|m| m.get("include_reasoning"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

async fn orchestrate(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<OrchestrateRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let include_reasoning = wants_reasoning(&request);
    let response = orchestrator.orchestrate(request, include_reasoning).await?;
    Ok(Json(response))
}

/// Identical surface with the full reasoning chain always attached.
async fn orchestrate_v2(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<OrchestrateRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let response = orchestrator.orchestrate(request, true).await?;
    Ok(Json(response))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn info() -> impl IntoResponse {
    Json(json!({
        "service": "haven-orchestrator",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
