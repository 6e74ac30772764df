//! Knowledge-base expansion records

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of expanding a query against the static domain knowledge base.
///
/// Expansions are deterministic phrase-to-terms mappings; the suggested
/// filters use retrieval gateway field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeExpansion {
    pub original_query: String,
    pub cleaned_query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expanded_terms: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub suggested_filters: HashMap<String, serde_json::Value>,
    pub reasoning: String,
}

impl KnowledgeExpansion {
    /// Expansion that leaves the query untouched.
    pub fn identity(query: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            original_query: query.clone(),
            cleaned_query: query,
            expanded_terms: Vec::new(),
            suggested_filters: HashMap::new(),
            reasoning: "no known domain phrases matched".to_string(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.expanded_terms.is_empty() && self.suggested_filters.is_empty()
    }
}
