//! The gateway itself: route resolution, fallback walk, breaker checks

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerStats};
use crate::config::GatewayConfig;
use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ModelInfo};
use crate::routing::ModelRoute;
use crate::{GatewayError, Result};

/// Multi-provider LLM gateway.
///
/// Resolution walks the routing table's candidate list in order, skipping
/// routes whose circuit is open. Each candidate gets the full retry
/// policy before the walk moves on; success records into the breaker and
/// returns with the actual model tag.
pub struct LlmGateway {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: GatewayConfig,
}

impl LlmGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            providers: HashMap::new(),
            breakers: DashMap::new(),
            config,
        }
    }

    /// Register a provider under its own name. Call during startup
    /// wiring, before the gateway is shared.
    pub fn register_provider(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn breaker_for(&self, key: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(key, self.config.breaker.clone()))
            })
            .clone()
    }

    /// Chat completion with routing, fallback, retry, and breaker
    /// protection.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        if request.messages.is_empty() {
            return Err(GatewayError::BadRequest(
                "chat request must contain at least one message".to_string(),
            ));
        }

        let routes = self.config.routing.resolve(&request.model)?.to_vec();
        let mut last_error: Option<GatewayError> = None;

        for route in &routes {
            match self.try_route(route, &request).await {
                Ok(response) => return Ok(response),
                Err(GatewayError::CircuitOpen { route }) => {
                    debug!(%route, "skipping route with open circuit");
                }
                Err(error @ GatewayError::BadRequest(_)) => {
                    // A malformed request will fail everywhere; abort.
                    return Err(error);
                }
                Err(error) => {
                    warn!(route = %route.key(), error = %error, "route exhausted, falling back");
                    last_error = Some(error);
                }
            }
        }

        Err(match last_error {
            Some(error @ GatewayError::RateLimited { .. }) => error,
            Some(error) => GatewayError::ProviderUnavailable {
                model: request.model.clone(),
                detail: error.to_string(),
            },
            None => GatewayError::ProviderUnavailable {
                model: request.model.clone(),
                detail: "all candidate routes have open circuits".to_string(),
            },
        })
    }

    async fn try_route(&self, route: &ModelRoute, request: &ChatRequest) -> Result<ChatResponse> {
        let key = route.key();
        let provider = self.providers.get(&route.provider).ok_or_else(|| {
            GatewayError::Configuration(format!("no provider registered as '{}'", route.provider))
        })?;

        let breaker = self.breaker_for(&key);
        if !breaker.should_allow() {
            return Err(GatewayError::CircuitOpen { route: key });
        }

        let started = Instant::now();
        let result = self
            .config
            .retry
            .execute(&key, || provider.chat(&route.model, request))
            .await;

        match result {
            Ok(mut response) => {
                breaker.record_success();
                response.provider = route.provider.clone();
                response.model = key.clone();
                response.latency_ms = started.elapsed().as_millis() as u64;
                info!(
                    request_id = %request.request_id,
                    model_requested = %request.model,
                    model_used = %key,
                    latency_ms = response.latency_ms,
                    total_tokens = response.usage.total_tokens,
                    "chat completion served"
                );
                Ok(response)
            }
            Err(error) => {
                if !matches!(error, GatewayError::BadRequest(_)) {
                    breaker.record_failure();
                }
                Err(error)
            }
        }
    }

    /// Uniform embedding API over the `primary-embed` routing tag (or
    /// any tag the caller names).
    pub async fn embed(&self, model_tag: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Err(GatewayError::BadRequest(
                "embedding input must not be empty".to_string(),
            ));
        }

        let routes = self.config.routing.resolve(model_tag)?.to_vec();
        let mut last_error: Option<GatewayError> = None;

        for route in &routes {
            let key = route.key();
            let Some(provider) = self.providers.get(&route.provider) else {
                last_error = Some(GatewayError::Configuration(format!(
                    "no provider registered as '{}'",
                    route.provider
                )));
                continue;
            };

            let breaker = self.breaker_for(&key);
            if !breaker.should_allow() {
                debug!(route = %key, "skipping embed route with open circuit");
                continue;
            }

            match self
                .config
                .retry
                .execute(&key, || provider.embed(&route.model, inputs))
                .await
            {
                Ok(vectors) => {
                    breaker.record_success();
                    return Ok(vectors);
                }
                Err(error @ GatewayError::BadRequest(_)) => return Err(error),
                Err(error) => {
                    breaker.record_failure();
                    warn!(route = %key, error = %error, "embed route exhausted");
                    last_error = Some(error);
                }
            }
        }

        Err(match last_error {
            Some(error @ GatewayError::RateLimited { .. }) => error,
            Some(error) => GatewayError::ProviderUnavailable {
                model: model_tag.to_string(),
                detail: error.to_string(),
            },
            None => GatewayError::ProviderUnavailable {
                model: model_tag.to_string(),
                detail: "all candidate routes have open circuits".to_string(),
            },
        })
    }

    /// Logical tags with their provider bindings, plus per-provider
    /// model descriptors.
    pub fn list_models(&self) -> Vec<serde_json::Value> {
        self.config
            .routing
            .tags()
            .into_iter()
            .map(|(tag, routes)| {
                serde_json::json!({
                    "tag": tag,
                    "routes": routes.iter().map(|r| r.key()).collect::<Vec<_>>(),
                })
            })
            .collect()
    }

    /// Model descriptors from every registered provider.
    pub fn provider_models(&self) -> Vec<ModelInfo> {
        let mut models: Vec<ModelInfo> = self
            .providers
            .values()
            .flat_map(|p| p.models())
            .collect();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        models
    }

    /// Breaker state per route, for the info surface.
    pub fn route_stats(&self) -> Vec<(String, CircuitBreakerStats)> {
        let mut stats: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }
}
