//! HTTP surface of the retrieval gateway

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::filters::SearchFilters;
use crate::gateway::RetrievalGateway;
use crate::RetrievalError;

impl IntoResponse for RetrievalError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            RetrievalError::InvalidFilter { .. } => (StatusCode::BAD_REQUEST, "invalid_filter"),
            RetrievalError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            RetrievalError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            RetrievalError::EngineUnavailable { .. } | RetrievalError::CircuitOpen => {
                (StatusCode::SERVICE_UNAVAILABLE, "engine_unavailable")
            }
            RetrievalError::Network(_) | RetrievalError::Engine { .. } => {
                (StatusCode::BAD_GATEWAY, "engine_error")
            }
        };
        let body = json!({ "error": { "type": kind, "message": self.to_string() } });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    query: String,
    #[serde(default)]
    filters: serde_json::Value,
    #[serde(default)]
    limit: Option<usize>,
}

/// Build the retrieval router over a shared gateway.
pub fn router(gateway: Arc<RetrievalGateway>) -> Router {
    Router::new()
        .route("/search", post(search))
        .route("/properties/:id", get(get_property))
        .route("/health", get(health))
        .route("/info", get(info))
        .with_state(gateway)
}

async fn search(
    State(gateway): State<Arc<RetrievalGateway>>,
    Json(body): Json<SearchBody>,
) -> Result<impl IntoResponse, RetrievalError> {
    let filters = SearchFilters::from_value(body.filters)?;
    let started = Instant::now();
    let results = gateway.search(&body.query, &filters, body.limit).await?;
    let total = results.len();

    Ok(Json(json!({
        "results": results,
        "total": total,
        "execution_time_ms": started.elapsed().as_millis() as u64,
    })))
}

async fn get_property(
    State(gateway): State<Arc<RetrievalGateway>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, RetrievalError> {
    let document = gateway.get_by_id(&id).await?;
    Ok(Json(document))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn info(State(gateway): State<Arc<RetrievalGateway>>) -> impl IntoResponse {
    Json(json!({
        "service": "haven-retrieval-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "engine_circuit": gateway.engine_state(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture_engine::FixtureEngine;
    use crate::gateway::RetrievalConfig;
    use axum::body::Body;
    use axum::http::Request;
    use haven_types::{PropertyFields, RetrievedDocument};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let engine = FixtureEngine::with_documents(vec![RetrievedDocument::new(
            "p-1",
            "Căn hộ Quận 7",
        )
        .with_fields(PropertyFields {
            bedrooms: Some(2),
            ..Default::default()
        })]);
        let gateway = RetrievalGateway::new(Arc::new(engine), RetrievalConfig::default());
        router(Arc::new(gateway))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn search_returns_results_with_timing() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/search")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({"query": "căn hộ", "filters": {}, "limit": 5}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total"], 1);
        assert!(body["execution_time_ms"].is_number());
    }

    #[tokio::test]
    async fn invalid_filter_field_is_a_bad_request() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/search")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({"query": "căn hộ", "filters": {"paint": "blue"}}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn property_detail_404s_for_unknown_id() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/properties/ghost")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
