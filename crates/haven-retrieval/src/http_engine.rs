//! HTTP client for an external hybrid search engine

use async_trait::async_trait;
use haven_types::RetrievedDocument;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::engine::SearchEngine;
use crate::filters::SearchFilters;
use crate::{Result, RetrievalError};

#[derive(Debug, Deserialize)]
struct WireSearchResponse {
    #[serde(default)]
    results: Vec<RetrievedDocument>,
}

/// Engine client speaking the platform's engine wire contract:
/// `POST /vector/search`, `POST /keyword/search`, `GET /properties/{id}`.
pub struct HttpSearchEngine {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSearchEngine {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            timeout,
        }
    }

    fn map_transport_error(&self, error: reqwest::Error) -> RetrievalError {
        if error.is_timeout() {
            RetrievalError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            RetrievalError::Network(error.to_string())
        }
    }

    async fn search_leg(
        &self,
        leg: &str,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        let url = format!("{}/{leg}/search", self.base_url);
        debug!(%url, query, limit, "search engine call");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "query": query, "filters": filters, "limit": limit }))
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Engine {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let wire: WireSearchResponse =
            response.json().await.map_err(|e| RetrievalError::Engine {
                status: status.as_u16(),
                message: format!("unparseable engine response: {e}"),
            })?;
        Ok(wire.results)
    }
}

#[async_trait]
impl SearchEngine for HttpSearchEngine {
    async fn vector_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        self.search_leg("vector", query, filters, limit).await
    }

    async fn keyword_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        self.search_leg("keyword", query, filters, limit).await
    }

    async fn get_by_id(&self, property_id: &str) -> Result<serde_json::Value> {
        let url = format!("{}/properties/{property_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(RetrievalError::not_found(property_id));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Engine {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        response.json().await.map_err(|e| RetrievalError::Engine {
            status: status.as_u16(),
            message: format!("unparseable property document: {e}"),
        })
    }

    fn name(&self) -> &str {
        "http-engine"
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(RetrievalError::Engine {
                status: response.status().as_u16(),
                message: "health check failed".to_string(),
            })
        }
    }
}

impl std::fmt::Debug for HttpSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSearchEngine")
            .field("base_url", &self.base_url)
            .finish()
    }
}
