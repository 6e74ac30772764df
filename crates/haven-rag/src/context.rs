//! Request, response, and the mutable context threaded through operators

use haven_types::{Message, ReasoningChain, RetrievedDocument};
use haven_retrieval::SearchFilters;
use uuid::Uuid;

use crate::RagMode;

/// One retrieval-intent request entering the pipeline
#[derive(Debug, Clone)]
pub struct RagRequest {
    pub request_id: Uuid,
    pub query: String,
    pub filters: SearchFilters,
    pub history: Vec<Message>,
    /// BCP-47-ish language hint, `vi` or `en` in practice.
    pub language: String,
    pub mode: RagMode,
    /// Set by the caller when upstream ambiguity analysis was borderline;
    /// nudges HyDE on.
    pub ambiguous_hint: bool,
}

impl RagRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            query: query.into(),
            filters: SearchFilters::default(),
            history: Vec::new(),
            language: "vi".to_string(),
            mode: RagMode::Search,
            ambiguous_hint: false,
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_mode(mut self, mode: RagMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }
}

/// The grounded answer leaving the pipeline
#[derive(Debug, Clone)]
pub struct RagResponse {
    pub answer: String,
    /// Documents the answer is grounded in, in final presentation order.
    pub sources: Vec<RetrievedDocument>,
    pub chain: ReasoningChain,
    pub confidence: f64,
}

/// Mutable state shared by the operator chain
#[derive(Debug)]
pub struct RagContext {
    pub request: RagRequest,
    /// Query after rewrite; starts as the raw query.
    pub cleaned_query: String,
    /// Hypothetical ideal listing text drafted by HyDE, if any.
    pub hyde_text: Option<String>,
    /// Sub-queries produced by decomposition, if any.
    pub sub_queries: Vec<String>,
    /// Current candidate set, reordered and pruned as operators run.
    pub documents: Vec<RetrievedDocument>,
    /// Generated answer; set by the generation operator.
    pub answer: Option<String>,
    /// Reflection critique carried into a regeneration pass.
    pub critique: Option<String>,
    pub regenerations_used: u32,
    pub chain: ReasoningChain,
}

impl RagContext {
    pub fn new(request: RagRequest) -> Self {
        let cleaned_query = request.query.clone();
        Self {
            request,
            cleaned_query,
            hyde_text: None,
            sub_queries: Vec::new(),
            documents: Vec::new(),
            answer: None,
            critique: None,
            regenerations_used: 0,
            chain: ReasoningChain::new(),
        }
    }

    /// Texts retrieval should run with: sub-queries when decomposition
    /// produced them, otherwise the cleaned query.
    pub fn retrieval_queries(&self) -> Vec<String> {
        if self.sub_queries.is_empty() {
            vec![self.cleaned_query.clone()]
        } else {
            self.sub_queries.clone()
        }
    }
}
