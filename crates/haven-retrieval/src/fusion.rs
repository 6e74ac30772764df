//! Reciprocal rank fusion
//!
//! `score(d) = sum over lists containing d of weight(l) / (k + rank_l(d))`
//! with 1-based ranks. Ties break by ascending property id so output
//! order is stable across calls.

use haven_types::{RetrievalSource, RetrievedDocument};
use std::collections::HashMap;

/// One ranked list with its fusion weight
pub struct WeightedList {
    pub weight: f64,
    pub documents: Vec<RetrievedDocument>,
}

impl WeightedList {
    pub fn new(weight: f64, documents: Vec<RetrievedDocument>) -> Self {
        Self { weight, documents }
    }
}

/// Fuse ranked lists, returning at most `limit` documents with fused
/// scores descending.
pub fn rrf_fuse(lists: Vec<WeightedList>, k: f64, limit: usize) -> Vec<RetrievedDocument> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut documents: HashMap<String, RetrievedDocument> = HashMap::new();

    for list in lists {
        for (index, document) in list.documents.into_iter().enumerate() {
            let rank = (index + 1) as f64;
            let contribution = list.weight / (k + rank);
            *scores.entry(document.property_id.clone()).or_insert(0.0) += contribution;
            // First occurrence wins; later lists only contribute score
            documents
                .entry(document.property_id.clone())
                .or_insert(document);
        }
    }

    let mut fused: Vec<RetrievedDocument> = documents
        .into_values()
        .map(|mut document| {
            document.score = scores[&document.property_id];
            document.source = RetrievalSource::Fused;
            document
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.property_id.cmp(&b.property_id))
    });
    fused.truncate(limit);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(ids: &[&str]) -> Vec<RetrievedDocument> {
        ids.iter()
            .map(|id| RetrievedDocument::new(*id, format!("title {id}")))
            .collect()
    }

    #[test]
    fn document_in_both_lists_outranks_single_list_leaders() {
        let fused = rrf_fuse(
            vec![
                WeightedList::new(0.6, docs(&["a", "b", "c"])),
                WeightedList::new(0.4, docs(&["d", "b", "e"])),
            ],
            60.0,
            10,
        );
        // b: 0.6/62 + 0.4/62 > a: 0.6/61
        assert_eq!(fused[0].property_id, "b");
    }

    #[test]
    fn scores_follow_the_rrf_formula() {
        let fused = rrf_fuse(
            vec![
                WeightedList::new(0.6, docs(&["a"])),
                WeightedList::new(0.4, docs(&["a"])),
            ],
            60.0,
            10,
        );
        let expected = 0.6 / 61.0 + 0.4 / 61.0;
        assert!((fused[0].score - expected).abs() < 1e-12);
    }

    #[test]
    fn ties_break_by_ascending_property_id() {
        let fused = rrf_fuse(
            vec![
                WeightedList::new(0.5, docs(&["z"])),
                WeightedList::new(0.5, docs(&["a"])),
            ],
            60.0,
            10,
        );
        assert_eq!(fused[0].property_id, "a");
        assert_eq!(fused[1].property_id, "z");
    }

    #[test]
    fn limit_truncates_after_sorting() {
        let fused = rrf_fuse(
            vec![WeightedList::new(1.0, docs(&["a", "b", "c", "d"]))],
            60.0,
            2,
        );
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].property_id, "a");
    }

    #[test]
    fn fused_documents_carry_fused_source_tag() {
        let fused = rrf_fuse(vec![WeightedList::new(1.0, docs(&["a"]))], 60.0, 10);
        assert_eq!(fused[0].source, RetrievalSource::Fused);
    }

    #[test]
    fn empty_lists_fuse_to_empty() {
        assert!(rrf_fuse(vec![], 60.0, 10).is_empty());
        assert!(rrf_fuse(vec![WeightedList::new(1.0, vec![])], 60.0, 10).is_empty());
    }
}
