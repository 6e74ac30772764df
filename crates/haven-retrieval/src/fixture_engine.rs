//! In-process engine over a fixed document set
//!
//! Serves local runs and tests when no external engine is configured.
//! Ranking is deliberately simple: token overlap for the vector leg,
//! title term frequency for the keyword leg. Both legs apply filters
//! before ranking, like a real engine would.

use async_trait::async_trait;
use haven_types::{RetrievalSource, RetrievedDocument};
use serde_json::json;

use crate::engine::SearchEngine;
use crate::filters::SearchFilters;
use crate::{Result, RetrievalError};

/// Fixed-corpus search engine
#[derive(Default)]
pub struct FixtureEngine {
    documents: Vec<RetrievedDocument>,
}

impl FixtureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<RetrievedDocument>) -> Self {
        Self { documents }
    }

    fn searchable_text(document: &RetrievedDocument) -> String {
        let fields = &document.fields;
        let mut text = document.title.clone();
        for part in [
            fields.property_type.as_deref(),
            fields.district.as_deref(),
            fields.city.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            text.push(' ');
            text.push_str(part);
        }
        for feature in &fields.features {
            text.push(' ');
            text.push_str(feature);
        }
        text.to_lowercase()
    }

    fn ranked(
        &self,
        filters: &SearchFilters,
        limit: usize,
        source: RetrievalSource,
        score_fn: impl Fn(&RetrievedDocument) -> f64,
    ) -> Vec<RetrievedDocument> {
        let mut scored: Vec<RetrievedDocument> = self
            .documents
            .iter()
            .filter(|d| filters.matches(d))
            .map(|d| {
                let mut document = d.clone();
                document.score = score_fn(d);
                document.source = source;
                document
            })
            .filter(|d| d.score > 0.0)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.property_id.cmp(&b.property_id))
        });
        scored.truncate(limit);
        scored
    }
}

#[async_trait]
impl SearchEngine for FixtureEngine {
    async fn vector_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        let query_tokens: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Ok(self.ranked(filters, limit, RetrievalSource::Vector, |document| {
            let text = Self::searchable_text(document);
            let hits = query_tokens.iter().filter(|t| text.contains(*t)).count();
            if query_tokens.is_empty() {
                1.0
            } else {
                hits as f64 / query_tokens.len() as f64
            }
        }))
    }

    async fn keyword_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        let query_tokens: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Ok(self.ranked(filters, limit, RetrievalSource::Keyword, |document| {
            let title = document.title.to_lowercase();
            query_tokens
                .iter()
                .map(|t| title.matches(t.as_str()).count() as f64)
                .sum()
        }))
    }

    async fn get_by_id(&self, property_id: &str) -> Result<serde_json::Value> {
        let document = self
            .documents
            .iter()
            .find(|d| d.property_id == property_id)
            .ok_or_else(|| RetrievalError::not_found(property_id))?;

        let mut value = serde_json::to_value(document)
            .unwrap_or_else(|_| json!({ "property_id": property_id }));
        if let Some(object) = value.as_object_mut() {
            object.insert("id".to_string(), json!(property_id));
        }
        Ok(value)
    }

    fn name(&self) -> &str {
        "fixture-engine"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_types::PropertyFields;

    fn corpus() -> FixtureEngine {
        FixtureEngine::with_documents(vec![
            RetrievedDocument::new("p-1", "Căn hộ 2 phòng ngủ Quận 7").with_fields(
                PropertyFields {
                    bedrooms: Some(2),
                    district: Some("Quận 7".to_string()),
                    ..Default::default()
                },
            ),
            RetrievedDocument::new("p-2", "Nhà phố Quận 1").with_fields(PropertyFields {
                bedrooms: Some(4),
                district: Some("Quận 1".to_string()),
                ..Default::default()
            }),
        ])
    }

    #[tokio::test]
    async fn filters_apply_before_ranking() {
        let engine = corpus();
        let filters = SearchFilters {
            bedrooms: Some(2),
            ..Default::default()
        };
        let results = engine.vector_search("quận", &filters, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].property_id, "p-1");
    }

    #[tokio::test]
    async fn get_by_id_returns_full_document_or_not_found() {
        let engine = corpus();
        let value = engine.get_by_id("p-2").await.unwrap();
        assert_eq!(value["id"], "p-2");
        assert_eq!(value["title"], "Nhà phố Quận 1");

        assert!(matches!(
            engine.get_by_id("ghost").await,
            Err(RetrievalError::NotFound { .. })
        ));
    }
}
