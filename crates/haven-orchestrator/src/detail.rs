//! Property detail handler
//!
//! Resolves three reference modes: explicit property id, positional
//! phrase against the conversation's last retrieval ("căn số 2", "the
//! 2nd one"), or keyword match through retrieval. Returns a single
//! property-inspector component.

use haven_retrieval::{RetrievalGateway, SearchFilters};
use haven_types::ResponseComponent;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use crate::conversation::RetrievedRef;
use crate::{OrchestratorError, Result};

/// How the user referred to the property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyReference {
    Id(String),
    Position(usize),
    Keyword(String),
}

/// Resolution result: the inspector component plus the resolved id
#[derive(Debug)]
pub struct DetailResult {
    pub property_id: String,
    pub title: String,
    pub component: ResponseComponent,
}

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z]{1,8}-\d[\w-]*)\b").expect("id pattern compiles"));

static POSITION_PATTERNS: Lazy<Vec<(Regex, PositionKind)>> = Lazy::new(|| {
    vec![
        // "căn số 2", "căn 3", "nhà số 1"
        (
            Regex::new(r"(?:căn|nhà|bất động sản)\s+(?:số\s+|thứ\s+)?(\d+)\b").unwrap(),
            PositionKind::Digit,
        ),
        // bare "số 2" / "thứ 2"
        (
            Regex::new(r"(?:số|thứ)\s*(\d+)\b").unwrap(),
            PositionKind::Digit,
        ),
        // "#2"
        (Regex::new(r"#(\d+)\b").unwrap(), PositionKind::Digit),
        // "the 2nd one", "2nd"
        (
            Regex::new(r"\b(\d+)(?:st|nd|rd|th)\b").unwrap(),
            PositionKind::Digit,
        ),
        // spelled-out Vietnamese digits after a position marker
        (
            Regex::new(r"(?:căn|số|thứ)\s+(nhất|một|hai|ba|bốn|tư|năm|sáu|bảy|tám|chín|mười)")
                .unwrap(),
            PositionKind::VietnameseWord,
        ),
        // English ordinal words
        (
            Regex::new(r"\b(first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth)\b")
                .unwrap(),
            PositionKind::EnglishWord,
        ),
        // "căn đầu tiên" / "căn cuối" resolve to the ends of the list
        (Regex::new(r"đầu\s*tiên").unwrap(), PositionKind::First),
        (Regex::new(r"cuối\s*(?:cùng)?").unwrap(), PositionKind::Last),
    ]
});

#[derive(Debug, Clone, Copy)]
enum PositionKind {
    Digit,
    VietnameseWord,
    EnglishWord,
    First,
    Last,
}

fn vietnamese_ordinal(word: &str) -> Option<usize> {
    match word {
        "nhất" | "một" => Some(1),
        "hai" => Some(2),
        "ba" => Some(3),
        "bốn" | "tư" => Some(4),
        "năm" => Some(5),
        "sáu" => Some(6),
        "bảy" => Some(7),
        "tám" => Some(8),
        "chín" => Some(9),
        "mười" => Some(10),
        _ => None,
    }
}

fn english_ordinal(word: &str) -> Option<usize> {
    match word {
        "first" => Some(1),
        "second" => Some(2),
        "third" => Some(3),
        "fourth" => Some(4),
        "fifth" => Some(5),
        "sixth" => Some(6),
        "seventh" => Some(7),
        "eighth" => Some(8),
        "ninth" => Some(9),
        "tenth" => Some(10),
        _ => None,
    }
}

/// Parse the reference mode out of a detail query. `last_count` is the
/// size of the current last-retrieved set, used by "cuối cùng".
pub fn parse_reference(query: &str, last_count: usize) -> PropertyReference {
    if let Some(captures) = ID_PATTERN.captures(query) {
        return PropertyReference::Id(captures[1].to_string());
    }

    let lowered = query.to_lowercase();
    for (pattern, kind) in POSITION_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(&lowered) {
            let position = match kind {
                PositionKind::Digit => captures.get(1).and_then(|m| m.as_str().parse().ok()),
                PositionKind::VietnameseWord => {
                    captures.get(1).and_then(|m| vietnamese_ordinal(m.as_str()))
                }
                PositionKind::EnglishWord => {
                    captures.get(1).and_then(|m| english_ordinal(m.as_str()))
                }
                PositionKind::First => Some(1),
                PositionKind::Last => (last_count > 0).then_some(last_count),
            };
            if let Some(position) = position {
                return PropertyReference::Position(position);
            }
        }
    }

    PropertyReference::Keyword(query.to_string())
}

/// The detail handler itself
pub struct PropertyDetailHandler {
    retrieval: Arc<RetrievalGateway>,
    /// Minimum score for a keyword-mode match to count.
    score_threshold: f64,
}

impl PropertyDetailHandler {
    pub fn new(retrieval: Arc<RetrievalGateway>, score_threshold: f64) -> Self {
        Self {
            retrieval,
            score_threshold,
        }
    }

    /// Resolve a detail request against the conversation's last
    /// retrieval set.
    pub async fn handle(&self, query: &str, last_retrieved: &[RetrievedRef]) -> Result<DetailResult> {
        let reference = parse_reference(query, last_retrieved.len());
        debug!(?reference, "resolving property reference");

        match reference {
            PropertyReference::Id(id) => self.fetch(&id).await,
            PropertyReference::Position(position) => {
                let entry = last_retrieved.get(position.saturating_sub(1)).ok_or_else(|| {
                    OrchestratorError::input_invalid(
                        "Tôi không tìm thấy bất động sản ở vị trí đó trong kết quả gần nhất. \
                         Bạn có thể nói rõ tên hoặc mã căn được không?",
                    )
                })?;
                self.fetch(&entry.property_id).await
            }
            PropertyReference::Keyword(keyword) => {
                let results = self
                    .retrieval
                    .search(&keyword, &SearchFilters::default(), Some(1))
                    .await
                    .map_err(|e| OrchestratorError::ServiceDegraded {
                        detail: e.to_string(),
                    })?;
                let top = results
                    .into_iter()
                    .next()
                    .filter(|d| d.score >= self.score_threshold)
                    .ok_or_else(|| {
                        OrchestratorError::not_found(format!("property matching '{keyword}'"))
                    })?;
                self.fetch(&top.property_id).await
            }
        }
    }

    async fn fetch(&self, property_id: &str) -> Result<DetailResult> {
        let property_data = self
            .retrieval
            .get_by_id(property_id)
            .await
            .map_err(|error| match error {
                haven_retrieval::RetrievalError::NotFound { property_id } => {
                    OrchestratorError::not_found(format!("property {property_id}"))
                }
                other => OrchestratorError::ServiceDegraded {
                    detail: other.to_string(),
                },
            })?;

        let title = property_data
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or(property_id)
            .to_string();

        Ok(DetailResult {
            property_id: property_id.to_string(),
            title,
            component: ResponseComponent::inspector(property_data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_id_wins_over_everything() {
        let reference = parse_reference("xem chi tiết p-123 giúp tôi", 5);
        assert_eq!(reference, PropertyReference::Id("p-123".to_string()));
    }

    #[test]
    fn vietnamese_positional_phrases_parse() {
        assert_eq!(parse_reference("xem căn số 2", 5), PropertyReference::Position(2));
        assert_eq!(parse_reference("căn thứ hai", 5), PropertyReference::Position(2));
        assert_eq!(parse_reference("xem căn ba", 5), PropertyReference::Position(3));
        assert_eq!(parse_reference("căn số ba", 5), PropertyReference::Position(3));
        assert_eq!(parse_reference("xem căn 2", 5), PropertyReference::Position(2));
        assert_eq!(parse_reference("căn đầu tiên", 5), PropertyReference::Position(1));
        assert_eq!(parse_reference("căn cuối cùng", 5), PropertyReference::Position(5));
    }

    #[test]
    fn english_positional_phrases_parse() {
        assert_eq!(parse_reference("show me the 2nd one", 5), PropertyReference::Position(2));
        assert_eq!(parse_reference("the third option", 5), PropertyReference::Position(3));
        assert_eq!(parse_reference("#4", 5), PropertyReference::Position(4));
    }

    #[test]
    fn anything_else_is_a_keyword() {
        let reference = parse_reference("căn hộ Sunrise City", 0);
        assert_eq!(
            reference,
            PropertyReference::Keyword("căn hộ Sunrise City".to_string())
        );
    }
}
