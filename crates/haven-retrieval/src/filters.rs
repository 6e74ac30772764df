//! Structured search filters
//!
//! The recognized field set is closed; unknown field names are rejected
//! before any engine call. Filters are applied on both search legs
//! before fusion.

use haven_types::{ListingType, RetrievedDocument};
use serde::{Deserialize, Serialize};

use crate::{Result, RetrievalError};

/// Numeric range constraint with inclusive bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

impl RangeFilter {
    pub fn at_most(lte: f64) -> Self {
        Self {
            gte: None,
            lte: Some(lte),
        }
    }

    pub fn at_least(gte: f64) -> Self {
        Self {
            gte: Some(gte),
            lte: None,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.gte.map_or(true, |min| value >= min) && self.lte.map_or(true, |max| value <= max)
    }
}

/// The closed filter field set recognized by the gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_type: Option<ListingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<RangeFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<RangeFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl SearchFilters {
    /// Parse and validate a raw filter object. Unknown field names are
    /// an input error, not a silent drop.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| RetrievalError::invalid_filter(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether a document satisfies every present constraint. Feature
    /// matching is superset semantics: every requested feature must be
    /// present on the document.
    pub fn matches(&self, document: &RetrievedDocument) -> bool {
        let fields = &document.fields;

        if let Some(listing_type) = self.listing_type {
            if fields.listing_type != Some(listing_type) {
                return false;
            }
        }
        if let Some(property_type) = &self.property_type {
            if fields.property_type.as_deref() != Some(property_type.as_str()) {
                return false;
            }
        }
        if let Some(city) = &self.city {
            if fields.city.as_deref() != Some(city.as_str()) {
                return false;
            }
        }
        if let Some(district) = &self.district {
            if fields.district.as_deref() != Some(district.as_str()) {
                return false;
            }
        }
        if let Some(price) = &self.price {
            match fields.price {
                Some(value) if price.contains(value) => {}
                _ => return false,
            }
        }
        if let Some(area) = &self.area {
            match fields.area {
                Some(value) if area.contains(value) => {}
                _ => return false,
            }
        }
        if let Some(bedrooms) = self.bedrooms {
            if fields.bedrooms != Some(bedrooms) {
                return false;
            }
        }
        if let Some(bathrooms) = self.bathrooms {
            if fields.bathrooms != Some(bathrooms) {
                return false;
            }
        }
        self.features
            .iter()
            .all(|feature| fields.features.iter().any(|f| f == feature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_types::PropertyFields;
    use serde_json::json;

    fn document() -> RetrievedDocument {
        RetrievedDocument::new("p-1", "Căn hộ Quận 7").with_fields(PropertyFields {
            price: Some(2_800_000_000.0),
            area: Some(70.0),
            bedrooms: Some(2),
            district: Some("Quận 7".to_string()),
            city: Some("Hồ Chí Minh".to_string()),
            listing_type: Some(ListingType::Sale),
            property_type: Some("apartment".to_string()),
            features: vec!["balcony".to_string(), "river view".to_string()],
            ..Default::default()
        })
    }

    #[test]
    fn unknown_field_names_are_rejected() {
        let error = SearchFilters::from_value(json!({"floor_color": "red"})).unwrap_err();
        assert!(matches!(error, RetrievalError::InvalidFilter { .. }));
    }

    #[test]
    fn empty_filters_are_valid_and_match_everything() {
        let filters = SearchFilters::from_value(json!({})).unwrap();
        assert!(filters.is_empty());
        assert!(filters.matches(&document()));

        let filters = SearchFilters::from_value(serde_json::Value::Null).unwrap();
        assert!(filters.is_empty());
    }

    #[test]
    fn price_range_bounds_are_inclusive() {
        let filters = SearchFilters::from_value(json!({
            "price": {"gte": 2_800_000_000.0, "lte": 2_800_000_000.0}
        }))
        .unwrap();
        assert!(filters.matches(&document()));

        let filters = SearchFilters::from_value(json!({
            "price": {"lte": 2_000_000_000.0}
        }))
        .unwrap();
        assert!(!filters.matches(&document()));
    }

    #[test]
    fn features_use_superset_matching() {
        let filters = SearchFilters::from_value(json!({"features": ["balcony"]})).unwrap();
        assert!(filters.matches(&document()));

        let filters =
            SearchFilters::from_value(json!({"features": ["balcony", "pool"]})).unwrap();
        assert!(!filters.matches(&document()));
    }

    #[test]
    fn listing_type_parses_lowercase_values() {
        let filters = SearchFilters::from_value(json!({"listing_type": "rent"})).unwrap();
        assert!(!filters.matches(&document()));

        let error = SearchFilters::from_value(json!({"listing_type": "lease"}));
        assert!(error.is_err());
    }

    #[test]
    fn missing_field_on_document_fails_range_constraints() {
        let bare = RetrievedDocument::new("p-2", "no data");
        let filters = SearchFilters::from_value(json!({"price": {"lte": 100.0}})).unwrap();
        assert!(!filters.matches(&bare));
    }
}
