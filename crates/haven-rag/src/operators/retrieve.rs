//! Hybrid retrieval operator

use async_trait::async_trait;
use haven_retrieval::{rrf_fuse, RetrievalGateway, WeightedList};
use haven_types::{RetrievedDocument, Thought, ThoughtStage};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use super::{Operator, OperatorOutcome};
use crate::context::RagContext;

const HYDE_FUSION_K: f64 = 60.0;

/// Fetches candidates through the retrieval gateway.
///
/// With sub-queries present, each runs in parallel and the results merge
/// as a union keyed by property id with the maximum score. With a HyDE
/// draft present, the draft runs as a second retrieval text and the two
/// lists fuse by RRF.
pub struct HybridRetrieval {
    retrieval: Arc<RetrievalGateway>,
    limit: usize,
}

impl HybridRetrieval {
    pub fn new(retrieval: Arc<RetrievalGateway>, limit: usize) -> Self {
        Self { retrieval, limit }
    }

    async fn retrieve_one(&self, ctx: &RagContext, query: &str) -> Result<Vec<RetrievedDocument>, String> {
        let base = self
            .retrieval
            .search(query, &ctx.request.filters, Some(self.limit))
            .await
            .map_err(|e| e.to_string())?;

        let Some(hyde_text) = &ctx.hyde_text else {
            return Ok(base);
        };

        match self
            .retrieval
            .search(hyde_text, &ctx.request.filters, Some(self.limit))
            .await
        {
            Ok(hyde_results) => Ok(rrf_fuse(
                vec![
                    WeightedList::new(0.5, base),
                    WeightedList::new(0.5, hyde_results),
                ],
                HYDE_FUSION_K,
                self.limit,
            )),
            Err(error) => {
                warn!(error = %error, "hyde retrieval leg failed, using query results only");
                Ok(base)
            }
        }
    }
}

/// Union of per-sub-query result lists; merged score is the maximum any
/// list assigned the document.
fn merge_union_max(lists: Vec<Vec<RetrievedDocument>>, limit: usize) -> Vec<RetrievedDocument> {
    let mut merged: HashMap<String, RetrievedDocument> = HashMap::new();
    for list in lists {
        for document in list {
            match merged.get_mut(&document.property_id) {
                Some(existing) => existing.score = existing.score.max(document.score),
                None => {
                    merged.insert(document.property_id.clone(), document);
                }
            }
        }
    }
    let mut documents: Vec<RetrievedDocument> = merged.into_values().collect();
    documents.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.property_id.cmp(&b.property_id))
    });
    documents.truncate(limit);
    documents
}

#[async_trait]
impl Operator for HybridRetrieval {
    fn name(&self) -> &'static str {
        "hybrid_retrieval"
    }

    fn stage(&self) -> ThoughtStage {
        ThoughtStage::Retrieval
    }

    async fn run(&self, ctx: &mut RagContext) -> OperatorOutcome {
        let queries = ctx.retrieval_queries();
        let searches = queries.iter().map(|query| self.retrieve_one(ctx, query));
        let results = futures::future::join_all(searches).await;

        let mut lists = Vec::new();
        let mut errors = Vec::new();
        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(list) => lists.push(list),
                Err(error) => {
                    warn!(query, error = %error, "sub-query retrieval failed");
                    errors.push(error);
                }
            }
        }

        if lists.is_empty() {
            let detail = errors.join("; ");
            ctx.chain.record(
                Thought::new(self.stage(), "retrieval failed for every query", 0.0)
                    .with_data(json!({ "errors": errors })),
            );
            return OperatorOutcome::failed("retrieval", detail);
        }

        ctx.documents = merge_union_max(lists, self.limit);
        let confidence = if errors.is_empty() { 0.9 } else { 0.6 };
        ctx.chain.record(
            Thought::new(
                self.stage(),
                format!("retrieved {} candidate listings", ctx.documents.len()),
                confidence,
            )
            .with_data(json!({
                "queries": queries,
                "candidates": ctx.documents.len(),
                "failed_queries": errors.len(),
            })),
        );

        if errors.is_empty() {
            OperatorOutcome::Ok
        } else {
            OperatorOutcome::degraded("some sub-queries failed")
        }
    }
}
