//! Logical model tags and their provider routes

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{GatewayError, Result};

/// One concrete provider/model pair a logical tag can resolve to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRoute {
    pub provider: String,
    pub model: String,
}

impl ModelRoute {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Breaker key and log identifier, e.g. `openai/gpt-4o-mini`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

impl std::str::FromStr for ModelRoute {
    type Err = GatewayError;

    /// Parse `provider/model` (model may itself contain slashes).
    fn from_str(s: &str) -> Result<Self> {
        let (provider, model) = s.split_once('/').ok_or_else(|| {
            GatewayError::Configuration(format!("route '{s}' is not of the form provider/model"))
        })?;
        if provider.is_empty() || model.is_empty() {
            return Err(GatewayError::Configuration(format!(
                "route '{s}' has an empty provider or model"
            )));
        }
        Ok(ModelRoute::new(provider, model))
    }
}

/// Maps logical model tags to an ordered candidate route list.
///
/// The first route is primary; the rest are fallbacks tried in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingTable {
    routes: HashMap<String, Vec<ModelRoute>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default table: `primary-chat` falls back from OpenAI through
    /// Anthropic to a local Ollama model; `primary-embed` has no
    /// fallback because embedding spaces are provider-specific.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.set(
            "primary-chat",
            vec![
                ModelRoute::new("openai", "gpt-4o-mini"),
                ModelRoute::new("anthropic", "claude-3-haiku"),
                ModelRoute::new("ollama", "llama3.2"),
            ],
        );
        table.set(
            "primary-embed",
            vec![ModelRoute::new("openai", "text-embedding-ada-002")],
        );
        table
    }

    pub fn set(&mut self, tag: impl Into<String>, routes: Vec<ModelRoute>) {
        self.routes.insert(tag.into(), routes);
    }

    /// Ordered candidate routes for a logical tag.
    pub fn resolve(&self, tag: &str) -> Result<&[ModelRoute]> {
        self.routes
            .get(tag)
            .map(Vec::as_slice)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| GatewayError::UnknownModel(tag.to_string()))
    }

    pub fn tags(&self) -> Vec<(&str, &[ModelRoute])> {
        let mut tags: Vec<_> = self
            .routes
            .iter()
            .map(|(tag, routes)| (tag.as_str(), routes.as_slice()))
            .collect();
        tags.sort_by_key(|(tag, _)| *tag);
        tags
    }
}
