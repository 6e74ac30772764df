//! Gateway configuration
//!
//! An immutable value constructed once and passed in; nothing in the
//! gateway reads process-wide state.

use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::RetryPolicy;
use crate::routing::RoutingTable;

/// Configuration for an [`crate::LlmGateway`] instance
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub routing: RoutingTable,
    pub retry: RetryPolicy,
    pub breaker: CircuitBreakerConfig,
    /// Total deadline applied to each provider HTTP call.
    pub call_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            routing: RoutingTable::builtin(),
            retry: RetryPolicy::default(),
            breaker: CircuitBreakerConfig::default(),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    /// Reorder the `primary-chat` fallback chain so `primary` leads and
    /// `fallbacks` follow in the given order. Routes for providers not
    /// mentioned are dropped.
    pub fn with_provider_order(mut self, primary: &str, fallbacks: &[String]) -> Self {
        let existing = self
            .routing
            .resolve("primary-chat")
            .map(|r| r.to_vec())
            .unwrap_or_default();

        let mut ordered = Vec::new();
        for name in std::iter::once(primary).chain(fallbacks.iter().map(String::as_str)) {
            if let Some(route) = existing.iter().find(|r| r.provider == name) {
                ordered.push(route.clone());
            }
        }
        if !ordered.is_empty() {
            self.routing.set("primary-chat", ordered);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_order_reorders_chat_chain() {
        let config = GatewayConfig::default()
            .with_provider_order("ollama", &["openai".to_string()]);
        let routes = config.routing.resolve("primary-chat").unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].provider, "ollama");
        assert_eq!(routes[1].provider, "openai");
    }

    #[test]
    fn unknown_primary_keeps_builtin_chain() {
        let config = GatewayConfig::default().with_provider_order("nonexistent", &[]);
        let routes = config.routing.resolve("primary-chat").unwrap();
        assert_eq!(routes[0].provider, "openai");
    }
}
