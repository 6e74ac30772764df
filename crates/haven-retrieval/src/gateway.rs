//! The retrieval gateway: hybrid search with fusion and breaker guard

use haven_types::RetrievedDocument;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::engine::SearchEngine;
use crate::filters::SearchFilters;
use crate::fusion::{rrf_fuse, WeightedList};
use crate::{Result, RetrievalError};

/// Fusion and limit policy
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub rrf_k: f64,
    pub vector_weight: f64,
    pub keyword_weight: f64,
    pub default_limit: usize,
    pub breaker: CircuitBreakerConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            vector_weight: 0.6,
            keyword_weight: 0.4,
            default_limit: 20,
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Façade over one hybrid engine.
///
/// Both legs run concurrently; a single failed leg degrades to the
/// surviving list, and only a fully failed call counts against the
/// breaker.
pub struct RetrievalGateway {
    engine: Arc<dyn SearchEngine>,
    breaker: CircuitBreaker,
    config: RetrievalConfig,
}

impl RetrievalGateway {
    pub fn new(engine: Arc<dyn SearchEngine>, config: RetrievalConfig) -> Self {
        let breaker = CircuitBreaker::new(config.breaker.clone());
        Self {
            engine,
            breaker,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn engine_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Hybrid search: vector + keyword legs fused by RRF, fused score
    /// descending, ties broken by document id.
    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: Option<usize>,
    ) -> Result<Vec<RetrievedDocument>> {
        if !self.breaker.should_allow() {
            return Err(RetrievalError::CircuitOpen);
        }

        let limit = limit.unwrap_or(self.config.default_limit);
        let (vector, keyword) = tokio::join!(
            self.engine.vector_search(query, filters, limit),
            self.engine.keyword_search(query, filters, limit),
        );

        let mut lists = Vec::new();
        let mut last_error = None;

        match vector {
            Ok(documents) => lists.push(WeightedList::new(self.config.vector_weight, documents)),
            Err(error) => {
                warn!(error = %error, "vector leg failed, degrading to keyword only");
                last_error = Some(error);
            }
        }
        match keyword {
            Ok(documents) => lists.push(WeightedList::new(self.config.keyword_weight, documents)),
            Err(error) => {
                warn!(error = %error, "keyword leg failed, degrading to vector only");
                last_error = Some(error);
            }
        }

        if lists.is_empty() {
            self.breaker.record_failure();
            let detail = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "both search legs failed".to_string());
            return Err(RetrievalError::EngineUnavailable { detail });
        }

        self.breaker.record_success();
        let fused = rrf_fuse(lists, self.config.rrf_k, limit);
        debug!(query, results = fused.len(), "hybrid search complete");
        Ok(fused)
    }

    /// Full property document by id.
    pub async fn get_by_id(&self, property_id: &str) -> Result<serde_json::Value> {
        if !self.breaker.should_allow() {
            return Err(RetrievalError::CircuitOpen);
        }

        match self.engine.get_by_id(property_id).await {
            Ok(value) => {
                self.breaker.record_success();
                Ok(value)
            }
            // A 404 is an answer, not an outage
            Err(error @ RetrievalError::NotFound { .. }) => {
                self.breaker.record_success();
                Err(error)
            }
            Err(error) => {
                self.breaker.record_failure();
                Err(error)
            }
        }
    }

    pub async fn health(&self) -> Result<()> {
        self.engine.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture_engine::FixtureEngine;
    use async_trait::async_trait;
    use haven_types::PropertyFields;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FailingEngine {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SearchEngine for FailingEngine {
        async fn vector_search(
            &self,
            _query: &str,
            _filters: &SearchFilters,
            _limit: usize,
        ) -> Result<Vec<RetrievedDocument>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RetrievalError::Network("engine down".to_string()))
        }

        async fn keyword_search(
            &self,
            _query: &str,
            _filters: &SearchFilters,
            _limit: usize,
        ) -> Result<Vec<RetrievedDocument>> {
            Err(RetrievalError::Network("engine down".to_string()))
        }

        async fn get_by_id(&self, property_id: &str) -> Result<serde_json::Value> {
            Err(RetrievalError::not_found(property_id))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn corpus_gateway() -> RetrievalGateway {
        let engine = FixtureEngine::with_documents(vec![
            RetrievedDocument::new("p-1", "Căn hộ 2 phòng ngủ Quận 7").with_fields(
                PropertyFields {
                    bedrooms: Some(2),
                    district: Some("Quận 7".to_string()),
                    price: Some(2_800_000_000.0),
                    ..Default::default()
                },
            ),
            RetrievedDocument::new("p-2", "Căn hộ 3 phòng ngủ Quận 7").with_fields(
                PropertyFields {
                    bedrooms: Some(3),
                    district: Some("Quận 7".to_string()),
                    price: Some(4_100_000_000.0),
                    ..Default::default()
                },
            ),
        ]);
        RetrievalGateway::new(Arc::new(engine), RetrievalConfig::default())
    }

    #[tokio::test]
    async fn search_returns_fused_scores_descending() {
        let gateway = corpus_gateway();
        let results = gateway
            .search("căn hộ quận 7", &SearchFilters::default(), Some(10))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
        assert_eq!(results[0].source, haven_types::RetrievalSource::Fused);
    }

    #[tokio::test]
    async fn filters_constrain_results() {
        let gateway = corpus_gateway();
        let filters = SearchFilters {
            bedrooms: Some(2),
            price: Some(crate::filters::RangeFilter::at_most(3_000_000_000.0)),
            ..Default::default()
        };
        let results = gateway
            .search("căn hộ", &filters, Some(10))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].property_id, "p-1");
    }

    #[tokio::test]
    async fn breaker_opens_after_repeated_engine_failures() {
        let config = RetrievalConfig {
            breaker: CircuitBreakerConfig {
                failure_threshold: 2,
                reset_timeout: Duration::from_secs(60),
            },
            ..Default::default()
        };
        let engine = Arc::new(FailingEngine {
            calls: AtomicU32::new(0),
        });
        let gateway = RetrievalGateway::new(engine.clone(), config);

        for _ in 0..2 {
            let error = gateway
                .search("q", &SearchFilters::default(), None)
                .await
                .unwrap_err();
            assert!(matches!(error, RetrievalError::EngineUnavailable { .. }));
        }

        let calls_before = engine.calls.load(Ordering::SeqCst);
        let error = gateway
            .search("q", &SearchFilters::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(error, RetrievalError::CircuitOpen));
        assert_eq!(engine.calls.load(Ordering::SeqCst), calls_before);
    }

    #[tokio::test]
    async fn not_found_does_not_count_as_engine_failure() {
        let gateway = corpus_gateway();
        for _ in 0..10 {
            let error = gateway.get_by_id("ghost").await.unwrap_err();
            assert!(matches!(error, RetrievalError::NotFound { .. }));
        }
        assert_eq!(gateway.engine_state(), CircuitState::Closed);
    }
}
