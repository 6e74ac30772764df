//! Defensive extraction of JSON from LLM output
//!
//! Model responses are arbitrary text. Parsing walks a ladder: fenced
//! code block first, then the raw text, then the first balanced object
//! found anywhere in the text. Callers fall back to keyword rules when
//! the whole ladder misses.

/// Pull the contents of the first fenced code block (```json ... ``` or
/// a bare ``` ... ``` fence) out of `text`.
pub fn extract_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag on the fence line
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Locate the first balanced `{...}` object in `text`, respecting string
/// literals and escapes.
fn first_balanced_object(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a JSON object out of arbitrary model output.
///
/// Returns `None` only when no parse succeeds at any rung; callers then
/// apply their own deterministic fallback.
pub fn lenient_json(text: &str) -> Option<serde_json::Value> {
    if let Some(block) = extract_fenced_block(text) {
        if let Ok(value) = serde_json::from_str(block) {
            return Some(value);
        }
        if let Some(object) = first_balanced_object(block) {
            if let Ok(value) = serde_json::from_str(object) {
                return Some(value);
            }
        }
    }

    if let Ok(value) = serde_json::from_str(text.trim()) {
        return Some(value);
    }

    first_balanced_object(text).and_then(|object| serde_json::from_str(object).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_from_tagged_fence() {
        let text = "Here you go:\n```json\n{\"intent\": \"search\"}\n```\nDone.";
        let value = lenient_json(text).unwrap();
        assert_eq!(value["intent"], "search");
    }

    #[test]
    fn extracts_json_from_untagged_fence() {
        let text = "```\n{\"score\": 0.8}\n```";
        let value = lenient_json(text).unwrap();
        assert_eq!(value["score"], 0.8);
    }

    #[test]
    fn parses_bare_json() {
        let value = lenient_json("  {\"ok\": true} ").unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn finds_object_embedded_in_prose() {
        let text = "Sure! The classification is {\"intent\": \"chat\", \"confidence\": 0.9} hope that helps";
        let value = lenient_json(text).unwrap();
        assert_eq!(value["intent"], "chat");
    }

    #[test]
    fn respects_braces_inside_strings() {
        let text = "prefix {\"note\": \"an { inside\", \"n\": 1} suffix";
        let value = lenient_json(text).unwrap();
        assert_eq!(value["n"], 1);
    }

    #[test]
    fn returns_none_for_unparseable_text() {
        assert!(lenient_json("no json here at all").is_none());
        assert!(lenient_json("{broken").is_none());
    }
}
