//! Prompt builders for the pipeline's LLM calls

use haven_types::RetrievedDocument;

use crate::RagMode;

pub fn rewrite_system() -> String {
    "You normalize real-estate search queries. Fix typos, expand \
     abbreviations (PN = phòng ngủ, Q7 = Quận 7, HCM = Hồ Chí Minh), and \
     keep domain terms intact. Reply with only the cleaned query, no \
     commentary."
        .to_string()
}

pub fn hyde_system() -> String {
    "Draft a short ideal property listing (2-3 sentences) that would \
     perfectly answer the user's search. Write it as listing copy, in the \
     user's language. Reply with only the listing text."
        .to_string()
}

pub fn decompose_system() -> String {
    "Split the user's request into independent property-search \
     sub-queries. Reply as JSON: {\"sub_queries\": [\"...\"]}. If the \
     request has a single intent, return a one-element list."
        .to_string()
}

pub fn grade_system() -> String {
    "Score each candidate listing for relevance to the query on a 0.0 to \
     1.0 scale. Reply as JSON: {\"scores\": [{\"id\": \"...\", \"score\": \
     0.0}]} covering every candidate."
        .to_string()
}

pub fn grade_user(query: &str, documents: &[RetrievedDocument]) -> String {
    let mut prompt = format!("Query: {query}\n\nCandidates:\n");
    for document in documents {
        prompt.push_str(&document.context_line());
        prompt.push('\n');
    }
    prompt
}

pub fn rerank_system() -> String {
    "Order the candidate listings from most to least relevant for the \
     full query intent. Reply as JSON: {\"order\": [\"id\", ...]} listing \
     every candidate id exactly once."
        .to_string()
}

pub fn generation_system(mode: RagMode, language: &str) -> String {
    let task = match mode {
        RagMode::Search => {
            "Present the matching listings and answer the user's question \
             about them."
        }
        RagMode::Compare => {
            "Compare the listings side by side: price, area, location, \
             and standout features. Conclude with which fits which need."
        }
        RagMode::InvestmentAdvice => {
            "Assess the listings from an investment standpoint: price per \
             square meter, rental potential, and location trajectory."
        }
        RagMode::LocationInsights => {
            "Describe the neighborhoods these listings sit in: amenities, \
             transit, schools, and livability."
        }
    };
    format!(
        "You are a real-estate assistant. {task} Ground every factual \
         claim in the provided listings and reference them by id in \
         square brackets, e.g. [p-123]. If the context cannot answer the \
         question, say so plainly. Respond in {}.",
        language_name(language)
    )
}

pub fn generation_user(query: &str, documents: &[RetrievedDocument]) -> String {
    let mut prompt = format!("Question: {query}\n\nListings:\n");
    for document in documents {
        prompt.push_str(&document.context_line());
        prompt.push('\n');
    }
    prompt
}

pub fn reflection_system() -> String {
    "Judge the draft answer against the question and the listings. Score \
     coverage (does it address the question), grounding (is every claim \
     supported by a cited listing), and clarity, each 0.0 to 1.0. Reply \
     as JSON: {\"coverage\": 0.0, \"grounding\": 0.0, \"clarity\": 0.0, \
     \"critique\": \"...\"}."
        .to_string()
}

/// Fallback answer when no listings survive retrieval and grading.
pub fn no_matches_message(language: &str) -> String {
    if language.starts_with("vi") {
        "Rất tiếc, tôi không tìm thấy bất động sản nào phù hợp với yêu cầu \
         của bạn. Bạn có thể nới rộng khu vực hoặc khoảng giá để có thêm \
         lựa chọn."
            .to_string()
    } else {
        "Sorry, I could not find any properties matching your request. \
         You could widen the area or price range for more options."
            .to_string()
    }
}

fn language_name(language: &str) -> &str {
    if language.starts_with("vi") {
        "Vietnamese"
    } else {
        "the user's language"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_prompt_embeds_document_ids() {
        let documents = vec![RetrievedDocument::new("p-7", "Nhà phố Quận 2")];
        let prompt = generation_user("so sánh giúp tôi", &documents);
        assert!(prompt.contains("[p-7]"));
    }

    #[test]
    fn no_matches_message_is_language_appropriate() {
        assert!(no_matches_message("vi").contains("không tìm thấy"));
        assert!(no_matches_message("en").contains("could not find"));
    }

    #[test]
    fn each_mode_gets_a_distinct_generation_prompt() {
        let prompts: Vec<String> = [
            RagMode::Search,
            RagMode::Compare,
            RagMode::InvestmentAdvice,
            RagMode::LocationInsights,
        ]
        .iter()
        .map(|mode| generation_system(*mode, "vi"))
        .collect();
        for (i, a) in prompts.iter().enumerate() {
            for b in prompts.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
