//! Rule-based ambiguity detection
//!
//! Deterministic rules over closed word lists. Critical ambiguities stop
//! the request before any handler runs and come back as clarifying
//! questions with concrete options.

use haven_types::{AmbiguityItem, AmbiguityResult, AmbiguityType};
use once_cell::sync::Lazy;
use regex::Regex;

/// Subjective modifiers that say nothing actionable about a listing
const VAGUE_AESTHETIC_TERMS: &[&str] = &[
    "đẹp",
    "xịn",
    "sang",
    "sang trọng",
    "cao cấp",
    "hiện đại",
    "thoáng",
    "thoáng mát",
    "rộng rãi",
    "tiện nghi",
    "lung linh",
    "ấm cúng",
    "chất",
    "ngon",
    "nice",
    "beautiful",
    "luxurious",
    "modern",
    "spacious",
    "cozy",
    "fancy",
];

const PROPERTY_TYPE_WORDS: &[&str] = &[
    "căn hộ",
    "chung cư",
    "nhà",
    "nhà phố",
    "biệt thự",
    "đất",
    "đất nền",
    "văn phòng",
    "mặt bằng",
    "shophouse",
    "studio",
    "phòng trọ",
    "apartment",
    "house",
    "villa",
    "condo",
    "land",
    "office",
];

const SEARCH_VERBS: &[&str] = &[
    "tìm", "mua", "thuê", "cần", "kiếm", "xem", "find", "buy", "rent", "looking", "search",
];

/// Verbs that each signal a distinct request intent
const INTENT_VERBS: &[&str] = &[
    "mua", "thuê", "bán", "so sánh", "định giá", "đầu tư", "buy", "rent", "sell", "compare",
    "invest",
];

const CONNECTIVES: &[&str] = &[" và ", " hoặc ", " vừa ", "đồng thời", " and ", " or ", "; "];

const PRICE_WORDS: &[&str] = &[
    "giá", "tỷ", "triệu", "rẻ", "đắt", "budget", "price", "cheap", "expensive",
];

const PRICE_UNITS: &[&str] = &["tỷ", "ty", "triệu", "trieu", "tr", "billion", "million"];

/// A price is concrete when a number sits next to a price unit, e.g.
/// "3 tỷ" or "800 triệu". A stray digit ("quận 7") does not count.
fn has_priced_number(lowered: &str) -> bool {
    let tokens: Vec<&str> = lowered.split_whitespace().collect();
    tokens.iter().enumerate().any(|(i, token)| {
        let has_digit = token.chars().any(|c| c.is_ascii_digit());
        if !has_digit {
            return false;
        }
        let unit_inline = PRICE_UNITS.iter().any(|unit| token.ends_with(unit));
        let unit_next = tokens
            .get(i + 1)
            .map_or(false, |next| PRICE_UNITS.contains(next));
        unit_inline || unit_next
    })
}

const LOCATION_WORDS: &[&str] = &[
    "gần", "khu vực", "khu", "quanh", "near", "around", "area", "close to",
];

const KNOWN_PLACES: &[&str] = &[
    "quận",
    "huyện",
    "phường",
    "thảo điền",
    "thủ đức",
    "bình thạnh",
    "tân bình",
    "phú nhuận",
    "gò vấp",
    "hồ chí minh",
    "sài gòn",
    "hcm",
    "hà nội",
    "đà nẵng",
    "district",
];

/// A query that points at a specific earlier result ("căn số 2", "#3",
/// "p-12") is a follow-up reference, not an ambiguous request.
static REFERENCE_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:số|thứ)\s*\d+|căn\s+(?:nhất|một|hai|ba|bốn|tư|năm|sáu|bảy|tám|chín|mười|\d+)|#\d+|\b\d+(?:st|nd|rd|th)\b|đầu\s*tiên|cuối\s*cùng|\b[A-Za-z]{1,8}-\d[\w-]*\b",
    )
    .expect("reference pattern compiles")
});

/// Rule-based detector over the normalized query
#[derive(Debug, Clone, Default)]
pub struct AmbiguityDetector;

impl AmbiguityDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, query: &str) -> AmbiguityResult {
        let lowered = query.to_lowercase();

        if REFERENCE_HINT.is_match(&lowered) {
            return AmbiguityResult::clear();
        }
        let mut items = Vec::new();

        let has_property_type = contains_any(&lowered, PROPERTY_TYPE_WORDS);
        let has_digits = lowered.chars().any(|c| c.is_ascii_digit());
        let has_place = contains_any(&lowered, KNOWN_PLACES);
        let has_specific_criterion = has_digits || has_place;

        if !has_property_type && contains_any(&lowered, SEARCH_VERBS) {
            items.push(AmbiguityItem {
                ambiguity_type: AmbiguityType::PropertyTypeMissing,
                description: "the request names no property type".to_string(),
                clarifying_question: "Bạn đang tìm loại bất động sản nào?".to_string(),
                options: vec![
                    "Căn hộ chung cư".to_string(),
                    "Nhà phố".to_string(),
                    "Biệt thự".to_string(),
                    "Đất nền".to_string(),
                ],
                confidence: 0.85,
            });
        }

        let intent_verbs_present = INTENT_VERBS
            .iter()
            .filter(|verb| lowered.contains(**verb))
            .count();
        if intent_verbs_present >= 2 && contains_any(&lowered, CONNECTIVES) {
            items.push(AmbiguityItem {
                ambiguity_type: AmbiguityType::MultipleIntents,
                description: "the request combines several distinct intents".to_string(),
                clarifying_question: "Bạn muốn bắt đầu với việc nào trước?".to_string(),
                options: vec![
                    "Tìm mua".to_string(),
                    "Tìm thuê".to_string(),
                    "So sánh các lựa chọn".to_string(),
                ],
                confidence: 0.8,
            });
        }

        if contains_any(&lowered, VAGUE_AESTHETIC_TERMS) && !has_specific_criterion {
            items.push(AmbiguityItem {
                ambiguity_type: AmbiguityType::AmenityAmbiguous,
                description: "only subjective modifiers, no concrete criterion".to_string(),
                clarifying_question: "\"Đẹp\" với bạn nghĩa là gì? Hãy chọn tiêu chí cụ thể:"
                    .to_string(),
                options: vec![
                    "Thiết kế hiện đại".to_string(),
                    "View đẹp".to_string(),
                    "Nội thất cao cấp".to_string(),
                    "Kiến trúc ấn tượng".to_string(),
                ],
                confidence: 0.85,
            });
        }

        if contains_any(&lowered, PRICE_WORDS) && !has_priced_number(&lowered) {
            items.push(AmbiguityItem {
                ambiguity_type: AmbiguityType::PriceRangeUnclear,
                description: "a price word appears without a numeric range".to_string(),
                clarifying_question: "Khoảng giá bạn dự kiến là bao nhiêu?".to_string(),
                options: vec![
                    "Dưới 2 tỷ".to_string(),
                    "2 - 4 tỷ".to_string(),
                    "4 - 8 tỷ".to_string(),
                    "Trên 8 tỷ".to_string(),
                ],
                confidence: 0.8,
            });
        }

        if contains_any(&lowered, LOCATION_WORDS) && !has_place {
            items.push(AmbiguityItem {
                ambiguity_type: AmbiguityType::LocationUnderspecified,
                description: "a location hint appears without a district or city".to_string(),
                clarifying_question: "Bạn quan tâm khu vực nào?".to_string(),
                options: vec![
                    "Quận 1 / trung tâm".to_string(),
                    "Quận 2 / Thảo Điền".to_string(),
                    "Quận 7 / Phú Mỹ Hưng".to_string(),
                ],
                confidence: 0.7,
            });
        }

        AmbiguityResult::with_items(items)
    }
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|word| text.contains(word))
}
