//! Script detection and input normalization
//!
//! Deterministic Unicode-range classification; no external NLP. The
//! display text is never changed, only the normalized processing path.

use std::collections::BTreeSet;

/// Writing systems the normalizer distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Script {
    Latin,
    Vietnamese,
    Cjk,
    Cyrillic,
    Arabic,
}

const VIETNAMESE_EXTRAS: &str = "ăâđêôơưĂÂĐÊÔƠƯ";

fn is_vietnamese_char(c: char) -> bool {
    if VIETNAMESE_EXTRAS.contains(c) {
        return true;
    }
    // Latin Extended Additional carries the Vietnamese tone-marked range
    matches!(c, '\u{1EA0}'..='\u{1EF9}')
        || matches!(c, 'à' | 'á' | 'ã' | 'è' | 'é' | 'ì' | 'í' | 'ò' | 'ó' | 'õ' | 'ù' | 'ú'
            | 'ý' | 'À' | 'Á' | 'Ã' | 'È' | 'É' | 'Ì' | 'Í' | 'Ò' | 'Ó' | 'Õ' | 'Ù' | 'Ú' | 'Ý')
}

fn classify(c: char) -> Option<Script> {
    if is_vietnamese_char(c) {
        return Some(Script::Vietnamese);
    }
    match c {
        'a'..='z' | 'A'..='Z' => Some(Script::Latin),
        '\u{4E00}'..='\u{9FFF}' | '\u{3040}'..='\u{30FF}' | '\u{AC00}'..='\u{D7AF}' => {
            Some(Script::Cjk)
        }
        '\u{0400}'..='\u{04FF}' => Some(Script::Cyrillic),
        '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}' => Some(Script::Arabic),
        _ => None,
    }
}

/// Character sets present in the text
pub fn detect_scripts(text: &str) -> BTreeSet<Script> {
    text.chars().filter_map(classify).collect()
}

/// Best-effort language hint: Vietnamese diacritics win, otherwise Latin
/// text reads as English.
pub fn detect_language(text: &str) -> &'static str {
    let scripts = detect_scripts(text);
    if scripts.contains(&Script::Vietnamese) {
        "vi"
    } else {
        "en"
    }
}

fn is_emoji_or_decoration(c: char) -> bool {
    matches!(c,
        '\u{1F000}'..='\u{1FAFF}'   // emoji blocks
        | '\u{2600}'..='\u{27BF}'   // misc symbols, dingbats
        | '\u{FE00}'..='\u{FE0F}'   // variation selectors
        | '\u{200D}'                // zero-width joiner
        | '\u{2190}'..='\u{21FF}'   // arrows
        | '\u{2500}'..='\u{25FF}'   // box drawing, shapes
    )
}

/// Strip emoji and decorative characters from the processing path.
pub fn strip_decorations(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !is_emoji_or_decoration(*c)).collect();
    collapse_whitespace(&stripped)
}

/// With three or more scripts present, restrict the normalized text to
/// Vietnamese plus Latin (digits, punctuation, and whitespace survive).
pub fn simplify_scripts(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| match classify(*c) {
            Some(Script::Vietnamese) | Some(Script::Latin) | None => true,
            _ => false,
        })
        .collect();
    collapse_whitespace(&kept)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters on a character boundary.
pub fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    if text.chars().count() <= max {
        (text.to_string(), false)
    } else {
        (text.chars().take(max).collect(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vietnamese_diacritics_are_their_own_script() {
        let scripts = detect_scripts("Tìm căn hộ Quận 7");
        assert!(scripts.contains(&Script::Vietnamese));
        assert!(scripts.contains(&Script::Latin));
        assert_eq!(scripts.len(), 2);
    }

    #[test]
    fn two_scripts_are_preserved_three_trigger_simplification() {
        let two = "căn hộ apartment";
        assert_eq!(detect_scripts(two).len(), 2);

        let three = "căn hộ 公寓 apartment";
        let scripts = detect_scripts(three);
        assert_eq!(scripts.len(), 3);
        let simplified = simplify_scripts(three);
        assert!(!simplified.contains('公'));
        assert!(simplified.contains("căn hộ"));
        assert!(simplified.contains("apartment"));
    }

    #[test]
    fn emoji_are_stripped_from_the_processing_path() {
        let stripped = strip_decorations("tìm nhà 🏠🔥 đẹp");
        assert_eq!(stripped, "tìm nhà đẹp");
    }

    #[test]
    fn language_hint_follows_diacritics() {
        assert_eq!(detect_language("Tìm căn hộ"), "vi");
        assert_eq!(detect_language("find an apartment"), "en");
    }

    #[test]
    fn truncation_respects_character_boundaries() {
        let (text, truncated) = truncate_chars("căn hộ", 3);
        assert_eq!(text, "căn");
        assert!(truncated);

        let (text, truncated) = truncate_chars("nhà", 500);
        assert_eq!(text, "nhà");
        assert!(!truncated);
    }
}
