//! Static domain knowledge base
//!
//! Deterministic phrase-to-expansion mappings loaded once at startup.
//! Matching is case-insensitive and longest-phrase-first so "trường
//! quốc tế" wins over "trường".

use haven_types::KnowledgeExpansion;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::{OrchestratorError, Result};

/// One phrase mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub phrase: String,
    #[serde(default)]
    pub expanded_terms: Vec<String>,
    #[serde(default)]
    pub suggested_filters: HashMap<String, serde_json::Value>,
    pub rationale: String,
}

/// The loaded knowledge base
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    /// Compiled-in default set covering the common domain phrases.
    pub fn builtin() -> Self {
        let entries = vec![
            KnowledgeEntry {
                phrase: "trường quốc tế".to_string(),
                expanded_terms: ["BIS", "ISHCMC", "AIS", "SSIS", "international school"]
                    .map(String::from)
                    .to_vec(),
                suggested_filters: HashMap::from([(
                    "district".to_string(),
                    json!("Quận 2"),
                )]),
                rationale: "international schools cluster in Quận 2 / Thảo Điền".to_string(),
            },
            KnowledgeEntry {
                phrase: "gần metro".to_string(),
                expanded_terms: ["tuyến metro", "ga metro", "metro line 1", "near metro station"]
                    .map(String::from)
                    .to_vec(),
                suggested_filters: HashMap::new(),
                rationale: "proximity hint for listings along the metro corridor".to_string(),
            },
            KnowledgeEntry {
                phrase: "view sông".to_string(),
                expanded_terms: ["river view", "ven sông", "mặt sông"].map(String::from).to_vec(),
                suggested_filters: HashMap::from([(
                    "features".to_string(),
                    json!(["river view"]),
                )]),
                rationale: "river-view listings tag the feature explicitly".to_string(),
            },
            KnowledgeEntry {
                phrase: "trung tâm thành phố".to_string(),
                expanded_terms: ["CBD", "Quận 1", "downtown"].map(String::from).to_vec(),
                suggested_filters: HashMap::from([("district".to_string(), json!("Quận 1"))]),
                rationale: "the central business district is Quận 1".to_string(),
            },
            KnowledgeEntry {
                phrase: "nhà mới xây".to_string(),
                expanded_terms: ["bàn giao mới", "primary", "newly built"]
                    .map(String::from)
                    .to_vec(),
                suggested_filters: HashMap::new(),
                rationale: "newly built stock is listed as primary handover".to_string(),
            },
            KnowledgeEntry {
                phrase: "gần sân bay".to_string(),
                expanded_terms: ["Tân Sơn Nhất", "airport", "Quận Tân Bình"]
                    .map(String::from)
                    .to_vec(),
                suggested_filters: HashMap::from([(
                    "district".to_string(),
                    json!("Tân Bình"),
                )]),
                rationale: "the airport sits in Tân Bình".to_string(),
            },
        ];
        Self { entries }
    }

    /// Load entries from a JSON file, replacing the builtin set.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| OrchestratorError::Internal(format!("knowledge base read: {e}")))?;
        let entries: Vec<KnowledgeEntry> = serde_json::from_str(&raw)
            .map_err(|e| OrchestratorError::Internal(format!("knowledge base parse: {e}")))?;
        info!(count = entries.len(), "loaded knowledge base from file");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand a query against the phrase table. Matches accumulate;
    /// longer phrases are tried first.
    pub fn expand(&self, query: &str) -> KnowledgeExpansion {
        let lowered = query.to_lowercase();
        let mut expansion = KnowledgeExpansion::identity(query);
        let mut rationales = Vec::new();

        let mut by_length: Vec<&KnowledgeEntry> = self.entries.iter().collect();
        by_length.sort_by_key(|e| std::cmp::Reverse(e.phrase.chars().count()));

        for entry in by_length {
            if lowered.contains(&entry.phrase.to_lowercase()) {
                expansion
                    .expanded_terms
                    .extend(entry.expanded_terms.iter().cloned());
                for (field, value) in &entry.suggested_filters {
                    expansion
                        .suggested_filters
                        .entry(field.clone())
                        .or_insert_with(|| value.clone());
                }
                rationales.push(entry.rationale.clone());
            }
        }

        if !rationales.is_empty() {
            expansion.reasoning = rationales.join("; ");
        }
        expansion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn international_school_expands_to_acronyms_and_district() {
        let kb = KnowledgeBase::builtin();
        let expansion = kb.expand("căn hộ gần trường quốc tế");
        assert!(expansion.expanded_terms.iter().any(|t| t == "BIS"));
        assert_eq!(expansion.suggested_filters["district"], json!("Quận 2"));
    }

    #[test]
    fn metro_phrase_expands_without_filters() {
        let kb = KnowledgeBase::builtin();
        let expansion = kb.expand("nhà gần metro");
        assert!(!expansion.expanded_terms.is_empty());
        assert!(expansion.suggested_filters.is_empty());
    }

    #[test]
    fn unmatched_query_is_identity() {
        let kb = KnowledgeBase::builtin();
        let expansion = kb.expand("căn hộ 2 phòng ngủ");
        assert!(expansion.is_identity());
        assert_eq!(expansion.cleaned_query, "căn hộ 2 phòng ngủ");
    }

    #[test]
    fn expansion_is_deterministic() {
        let kb = KnowledgeBase::builtin();
        let first = kb.expand("nhà view sông gần metro");
        let second = kb.expand("nhà view sông gần metro");
        assert_eq!(first.expanded_terms, second.expanded_terms);
    }

    #[test]
    fn longest_phrase_wins_on_filter_conflict() {
        let kb = KnowledgeBase::builtin();
        // Both phrases suggest a district; "trung tâm thành phố" is
        // longer, so its filter lands first and is kept
        let expansion = kb.expand("gần trường quốc tế và trung tâm thành phố");
        assert_eq!(expansion.suggested_filters["district"], json!("Quận 1"));
    }
}
