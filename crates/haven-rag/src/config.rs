//! Pipeline configuration
//!
//! Every operator can be toggled; the pipeline stays functional with the
//! minimal chain of retrieval and generation.

#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Logical model tag used for every LLM call in the pipeline.
    pub chat_model: String,
    /// Candidate documents fetched per retrieval call.
    pub retrieval_limit: usize,
    /// Documents scoring below this after grading are dropped.
    pub grader_threshold: f64,
    /// Reflection scores below this trigger one regeneration.
    pub reflection_threshold: f64,
    /// Documents injected into the generation prompt.
    pub generation_top_k: usize,
    /// Extra generation passes allowed per request.
    pub max_regenerations: u32,
    /// Queries at or below this many tokens enable HyDE drafting.
    pub hyde_short_query_tokens: usize,
    pub enable_rewrite: bool,
    pub enable_hyde: bool,
    pub enable_decomposition: bool,
    pub enable_grading: bool,
    pub enable_rerank: bool,
    pub enable_reflection: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chat_model: "primary-chat".to_string(),
            retrieval_limit: 20,
            grader_threshold: 0.5,
            reflection_threshold: 0.7,
            generation_top_k: 5,
            max_regenerations: 1,
            hyde_short_query_tokens: 5,
            enable_rewrite: true,
            enable_hyde: false,
            enable_decomposition: false,
            enable_grading: true,
            enable_rerank: true,
            enable_reflection: true,
        }
    }
}

impl RagConfig {
    /// The minimal viable chain: retrieval and generation only.
    pub fn minimal() -> Self {
        Self {
            enable_rewrite: false,
            enable_hyde: false,
            enable_decomposition: false,
            enable_grading: false,
            enable_rerank: false,
            enable_reflection: false,
            ..Default::default()
        }
    }
}
