//! Haven Retrieval Gateway
//!
//! A thin façade over hybrid (vector + keyword) property search engines.
//! Accepts a structured query, runs both search legs, fuses them with
//! reciprocal rank fusion, and returns a ranked document list. The
//! engine behind the gateway is a query target, not an index owned here.

use thiserror::Error;

pub mod circuit_breaker;
pub mod engine;
pub mod filters;
pub mod fixture_engine;
pub mod fusion;
pub mod gateway;
pub mod http;
pub mod http_engine;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use engine::SearchEngine;
pub use filters::{RangeFilter, SearchFilters};
pub use fixture_engine::FixtureEngine;
pub use fusion::{rrf_fuse, WeightedList};
pub use gateway::{RetrievalConfig, RetrievalGateway};
pub use http::router;

/// Errors surfaced by the retrieval gateway
#[derive(Error, Debug, Clone)]
pub enum RetrievalError {
    #[error("invalid filter: {message}")]
    InvalidFilter { message: String },

    #[error("property not found: {property_id}")]
    NotFound { property_id: String },

    #[error("search engine unavailable: {detail}")]
    EngineUnavailable { detail: String },

    #[error("circuit open for search engine")]
    CircuitOpen,

    #[error("network error: {0}")]
    Network(String),

    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("engine error ({status}): {message}")]
    Engine { status: u16, message: String },
}

impl RetrievalError {
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            message: message.into(),
        }
    }

    pub fn not_found(property_id: impl Into<String>) -> Self {
        Self::NotFound {
            property_id: property_id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
