//! Ambiguity detection results

use serde::{Deserialize, Serialize};

/// Kinds of ambiguity the orchestrator detects in a query
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityType {
    PropertyTypeMissing,
    MultipleIntents,
    AmenityAmbiguous,
    PriceRangeUnclear,
    LocationUnderspecified,
}

impl AmbiguityType {
    /// Critical ambiguities block handler dispatch and force a
    /// clarification response. Amenity ambiguity is only ever reported
    /// when no specific criterion accompanies the vague term, so it is
    /// critical whenever present.
    pub fn is_critical(&self) -> bool {
        !matches!(self, AmbiguityType::LocationUnderspecified)
    }
}

/// One detected ambiguity with a clarifying question for the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbiguityItem {
    #[serde(rename = "type")]
    pub ambiguity_type: AmbiguityType,
    pub description: String,
    pub clarifying_question: String,
    /// At least two option strings the user can pick from.
    pub options: Vec<String>,
    pub confidence: f64,
}

/// Outcome of evaluating a query against the ambiguity rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmbiguityResult {
    pub has_ambiguity: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<AmbiguityItem>,
}

impl AmbiguityResult {
    pub fn clear() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<AmbiguityItem>) -> Self {
        Self {
            has_ambiguity: !items.is_empty(),
            items,
        }
    }

    pub fn has_critical(&self) -> bool {
        self.items.iter().any(|i| i.ambiguity_type.is_critical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_underspecified_is_not_critical() {
        assert!(!AmbiguityType::LocationUnderspecified.is_critical());
        assert!(AmbiguityType::PropertyTypeMissing.is_critical());
        assert!(AmbiguityType::MultipleIntents.is_critical());
        assert!(AmbiguityType::AmenityAmbiguous.is_critical());
        assert!(AmbiguityType::PriceRangeUnclear.is_critical());
    }

    #[test]
    fn item_type_serializes_under_type_key() {
        let item = AmbiguityItem {
            ambiguity_type: AmbiguityType::PriceRangeUnclear,
            description: "price word without range".to_string(),
            clarifying_question: "What price range?".to_string(),
            options: vec!["under 2B".to_string(), "2-4B".to_string()],
            confidence: 0.8,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "price_range_unclear");
    }
}
