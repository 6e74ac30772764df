//! The search engine seam
//!
//! Vector and BM25 index implementations live behind this trait as query
//! targets; the gateway owns fusion and filtering policy, never the
//! indexes themselves.

use async_trait::async_trait;
use haven_types::RetrievedDocument;

use crate::filters::SearchFilters;
use crate::Result;

/// A hybrid search engine serving both retrieval legs over one corpus
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Vector-similarity leg. Filters are applied engine-side, before
    /// fusion.
    async fn vector_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>>;

    /// Keyword (BM25-style) leg.
    async fn keyword_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>>;

    /// Full property document by id; the source of truth for the detail
    /// path.
    async fn get_by_id(&self, property_id: &str) -> Result<serde_json::Value>;

    fn name(&self) -> &str;

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
