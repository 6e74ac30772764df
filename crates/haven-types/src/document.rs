//! Retrieved property documents returned by the retrieval gateway

use serde::{Deserialize, Serialize};

/// Which retrieval list a document came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalSource {
    Vector,
    Keyword,
    Fused,
}

/// Sale vs. rental listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Sale,
    Rent,
}

/// Structured fields of a property listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_type: Option<ListingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

/// A document returned by a retrieval call.
///
/// `property_id` is stable across retrievals; `score` is comparable only
/// within the retrieval call that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub property_id: String,
    pub title: String,
    #[serde(flatten)]
    pub fields: PropertyFields,
    pub score: f64,
    pub source: RetrievalSource,
}

impl RetrievedDocument {
    pub fn new(property_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            title: title.into(),
            fields: PropertyFields::default(),
            score: 0.0,
            source: RetrievalSource::Fused,
        }
    }

    pub fn with_score(mut self, score: f64, source: RetrievalSource) -> Self {
        self.score = score;
        self.source = source;
        self
    }

    pub fn with_fields(mut self, fields: PropertyFields) -> Self {
        self.fields = fields;
        self
    }

    /// Compact single-line summary used when injecting documents into
    /// LLM prompts.
    pub fn context_line(&self) -> String {
        let mut parts = vec![format!("[{}] {}", self.property_id, self.title)];
        if let Some(pt) = &self.fields.property_type {
            parts.push(pt.clone());
        }
        if let Some(bedrooms) = self.fields.bedrooms {
            parts.push(format!("{bedrooms} BR"));
        }
        if let Some(area) = self.fields.area {
            parts.push(format!("{area} m2"));
        }
        if let Some(price) = self.fields.price {
            parts.push(format!("price {price}"));
        }
        if let Some(district) = &self.fields.district {
            parts.push(district.clone());
        }
        if let Some(city) = &self.fields.city {
            parts.push(city.clone());
        }
        if !self.fields.features.is_empty() {
            parts.push(self.fields.features.join(", "));
        }
        parts.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_fields_flatten_into_document_json() {
        let doc = RetrievedDocument::new("p-1", "Sunrise City 2BR").with_fields(PropertyFields {
            price: Some(2_900_000_000.0),
            bedrooms: Some(2),
            district: Some("Quận 7".to_string()),
            ..Default::default()
        });

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["property_id"], "p-1");
        assert_eq!(json["bedrooms"], 2);
        assert_eq!(json["district"], "Quận 7");
        assert!(json.get("area").is_none());
    }

    #[test]
    fn context_line_mentions_id_and_district() {
        let doc = RetrievedDocument::new("p-9", "Riverside flat").with_fields(PropertyFields {
            district: Some("Quận 2".to_string()),
            ..Default::default()
        });
        let line = doc.context_line();
        assert!(line.contains("[p-9]"));
        assert!(line.contains("Quận 2"));
    }
}
