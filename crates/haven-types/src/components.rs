//! Structured response components emitted by the orchestrator

use crate::document::RetrievedDocument;
use serde::{Deserialize, Serialize};

/// UI-facing component descriptor carried on orchestrated responses.
///
/// Carousels summarize a result set; inspectors show one property in
/// depth. The wire shape is `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ResponseComponent {
    PropertyCarousel {
        properties: Vec<RetrievedDocument>,
        total: usize,
    },
    PropertyInspector {
        property_data: serde_json::Value,
    },
}

impl ResponseComponent {
    pub fn carousel(properties: Vec<RetrievedDocument>) -> Self {
        let total = properties.len();
        Self::PropertyCarousel { properties, total }
    }

    pub fn inspector(property_data: serde_json::Value) -> Self {
        Self::PropertyInspector { property_data }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PropertyCarousel { .. } => "property-carousel",
            Self::PropertyInspector { .. } => "property-inspector",
        }
    }
}
