//! Haven LLM Gateway
//!
//! The single call site for all LLM usage on the platform. Absorbs
//! provider variance behind a uniform chat/embed contract, resolves
//! logical model tags through a routing table with ordered fallbacks, and
//! protects every downstream route with retry and a circuit breaker.

use thiserror::Error;

pub mod circuit_breaker;
pub mod config;
pub mod gateway;
pub mod http;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod routing;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use config::GatewayConfig;
pub use gateway::LlmGateway;
pub use http::router;
pub use provider::{ChatRequest, ChatResponse, LlmProvider, ModelInfo, Usage};
pub use providers::{
    shared_http_client, AnthropicProvider, OllamaProvider, OpenAiProvider, ProviderSettings,
};
pub use retry::RetryPolicy;
pub use routing::{ModelRoute, RoutingTable};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockLlmProvider;

/// Failure kinds surfaced by the gateway.
///
/// The gateway recovers locally (retries, fallback routes); callers only
/// see an error once that policy is exhausted.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("all provider routes exhausted for model '{model}': {detail}")]
    ProviderUnavailable { model: String, detail: String },

    #[error("rate limited by provider")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("circuit open for route {route}")]
    CircuitOpen { route: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("unknown model tag: {0}")]
    UnknownModel(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    /// Errors worth retrying on the same route: timeouts, connection
    /// failures, 5xx responses, and 429 rate limits. Other 4xx abort.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network(_) | GatewayError::Timeout { .. } => true,
            GatewayError::RateLimited { .. } => true,
            GatewayError::Provider { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
