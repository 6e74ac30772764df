//! Client for the registry's HTTP surface
//!
//! Used by services to self-register at startup and deregister on
//! shutdown. Registration is always an explicit lifecycle step, never a
//! construction side effect.

use serde_json::json;
use tracing::{info, warn};

use crate::record::ServiceRecord;
use crate::{RegistryError, Result};

/// HTTP client for one registry instance
pub struct RegistrationClient {
    base_url: String,
    client: reqwest::Client,
}

impl RegistrationClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Register a service, returning the record the registry stored.
    pub async fn register(
        &self,
        name: &str,
        host: &str,
        port: u16,
        version: &str,
        capabilities: &[&str],
    ) -> Result<ServiceRecord> {
        let url = format!("{}/register", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "name": name,
                "host": host,
                "port": port,
                "version": version,
                "capabilities": capabilities,
            }))
            .send()
            .await
            .map_err(|e| RegistryError::invalid(format!("registry unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(RegistryError::invalid(format!(
                "registration rejected with status {}",
                response.status()
            )));
        }

        #[derive(serde::Deserialize)]
        struct Body {
            service: ServiceRecord,
        }
        let body: Body = response
            .json()
            .await
            .map_err(|e| RegistryError::invalid(format!("bad registration response: {e}")))?;
        info!(service = name, registry = %self.base_url, "registered with registry");
        Ok(body.service)
    }

    /// Deregister; best-effort, failures are logged and swallowed.
    pub async fn deregister(&self, name: &str) {
        let url = format!("{}/deregister", self.base_url);
        let result = self
            .client
            .post(&url)
            .json(&json!({ "name": name }))
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                info!(service = name, "deregistered from registry");
            }
            Ok(response) => {
                warn!(service = name, status = %response.status(), "deregistration rejected");
            }
            Err(error) => {
                warn!(service = name, error = %error, "deregistration failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ServiceCatalog;
    use crate::http::router;

    async fn spawn_registry() -> (String, ServiceCatalog) {
        let catalog = ServiceCatalog::new();
        let app = router(catalog.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        (format!("http://{addr}"), catalog)
    }

    #[tokio::test]
    async fn register_then_deregister_round_trips() {
        let (base_url, catalog) = spawn_registry().await;
        let client = RegistrationClient::new(base_url, reqwest::Client::new());

        let record = client
            .register("llm-gateway", "127.0.0.1", 8082, "1.0.0", &["llm"])
            .await
            .unwrap();
        assert_eq!(record.url, "http://127.0.0.1:8082");
        assert_eq!(catalog.stats().await.total, 1);

        client.deregister("llm-gateway").await;
        assert_eq!(catalog.stats().await.total, 0);
    }

    #[tokio::test]
    async fn unreachable_registry_yields_an_error() {
        let client = RegistrationClient::new("http://127.0.0.1:9", reqwest::Client::new());
        let result = client
            .register("svc", "127.0.0.1", 8000, "1.0.0", &[])
            .await;
        assert!(result.is_err());
    }
}
