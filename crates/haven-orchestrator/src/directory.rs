//! Service health lookups against the registry
//!
//! The orchestrator only asks one question before routing: does a
//! healthy service advertise this capability? Co-located deployments
//! answer from the shared catalog; split deployments ask the registry
//! over HTTP.

use async_trait::async_trait;
use haven_registry::{ServiceCatalog, ServiceStatus};
use serde::Deserialize;
use tracing::warn;

/// Capability health lookup
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    async fn healthy(&self, capability: &str) -> bool;
}

/// Directory over an in-process catalog
pub struct CatalogDirectory {
    catalog: ServiceCatalog,
}

impl CatalogDirectory {
    pub fn new(catalog: ServiceCatalog) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ServiceDirectory for CatalogDirectory {
    async fn healthy(&self, capability: &str) -> bool {
        !self
            .catalog
            .list(Some(capability), Some(ServiceStatus::Healthy))
            .await
            .is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct WireListResponse {
    #[serde(default)]
    count: usize,
}

/// Directory over the registry's HTTP surface
pub struct RegistryClient {
    base_url: String,
    client: reqwest::Client,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl ServiceDirectory for RegistryClient {
    async fn healthy(&self, capability: &str) -> bool {
        let url = format!(
            "{}/services?capability={capability}&status=healthy",
            self.base_url
        );
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<WireListResponse>()
                .await
                .map(|list| list.count > 0)
                .unwrap_or(false),
            Ok(response) => {
                warn!(status = %response.status(), "registry lookup failed");
                false
            }
            Err(error) => {
                // An unreachable registry must not take the platform
                // down with it; assume healthy and let breakers decide.
                warn!(error = %error, "registry unreachable, assuming services healthy");
                true
            }
        }
    }
}

/// Fixed answer, for tests and single-process runs
pub struct StaticDirectory {
    healthy: bool,
}

impl StaticDirectory {
    pub fn all_healthy() -> Self {
        Self { healthy: true }
    }

    pub fn all_unhealthy() -> Self {
        Self { healthy: false }
    }
}

#[async_trait]
impl ServiceDirectory for StaticDirectory {
    async fn healthy(&self, _capability: &str) -> bool {
        self.healthy
    }
}
