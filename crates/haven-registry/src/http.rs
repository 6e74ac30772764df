//! HTTP surface of the registry

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog::ServiceCatalog;
use crate::record::{ServiceRecord, ServiceStatus};
use crate::RegistryError;

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = match &self {
            RegistryError::NotFound { .. } => StatusCode::NOT_FOUND,
            RegistryError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
        };
        let body = json!({
            "error": match &self {
                RegistryError::NotFound { .. } => "not_found",
                RegistryError::InvalidArgument { .. } => "invalid_argument",
            },
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    name: String,
    host: String,
    port: u16,
    version: String,
    #[serde(default)]
    capabilities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DeregisterBody {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    capability: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    count: usize,
    services: Vec<ServiceRecord>,
}

/// Build the registry router over a shared catalog.
pub fn router(catalog: ServiceCatalog) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/deregister", post(deregister))
        .route("/services", get(list_services))
        .route("/services/:name", get(get_service))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .route("/info", get(info))
        .with_state(catalog)
}

async fn register(
    State(catalog): State<ServiceCatalog>,
    Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, RegistryError> {
    let service = catalog
        .register(
            &body.name,
            &body.host,
            body.port,
            &body.version,
            body.capabilities,
        )
        .await?;
    Ok(Json(json!({ "status": "registered", "service": service })))
}

async fn deregister(
    State(catalog): State<ServiceCatalog>,
    Json(body): Json<DeregisterBody>,
) -> impl IntoResponse {
    catalog.deregister(&body.name).await;
    Json(json!({ "status": "deregistered" }))
}

async fn list_services(
    State(catalog): State<ServiceCatalog>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, RegistryError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<ServiceStatus>)
        .transpose()
        .map_err(RegistryError::invalid)?;

    let services = catalog.list(params.capability.as_deref(), status).await;
    Ok(Json(ListResponse {
        count: services.len(),
        services,
    }))
}

async fn get_service(
    State(catalog): State<ServiceCatalog>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, RegistryError> {
    let record = catalog.get(&name).await?;
    Ok(Json(record))
}

async fn stats(State(catalog): State<ServiceCatalog>) -> impl IntoResponse {
    Json(catalog.stats().await)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn info() -> impl IntoResponse {
    Json(json!({
        "service": "haven-registry",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
