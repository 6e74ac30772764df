//! Haven Orchestrator
//!
//! The top-level entry point for user requests. Converts natural-language
//! input plus conversation context into a concrete handler call: input
//! validation, language detection, knowledge expansion, ambiguity
//! detection, intent classification, routing with health-aware
//! degradation, handler execution, and episodic memory updates. Every
//! stage appends to the request's reasoning chain.

use haven_types::ReasoningChain;
use thiserror::Error;

pub mod ambiguity;
pub mod config;
pub mod conversation;
pub mod detail;
pub mod directory;
pub mod http;
pub mod intent;
pub mod knowledge;
pub mod language;
pub mod orchestrator;
pub mod sqlite_store;

pub use ambiguity::AmbiguityDetector;
pub use config::OrchestratorConfig;
pub use conversation::{
    ConversationSnapshot, ConversationStore, MemoryConversationStore, RetrievedRef,
};
pub use detail::PropertyDetailHandler;
pub use directory::{CatalogDirectory, RegistryClient, ServiceDirectory, StaticDirectory};
pub use http::router;
pub use intent::{ExtractedEntities, Intent, IntentClassifier};
pub use knowledge::KnowledgeBase;
pub use orchestrator::{OrchestrateRequest, OrchestrationResponse, Orchestrator};
pub use sqlite_store::SqliteConversationStore;

/// Orchestrator-level failures mapped to user-visible HTTP responses
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Empty or malformed input; carries the domain-user message.
    #[error("invalid input: {message}")]
    InputInvalid { message: String },

    /// Deadline expired; carries whatever reasoning happened first.
    #[error("request deadline exceeded")]
    Timeout { partial_chain: Box<ReasoningChain> },

    /// Downstream circuits open or exhausted even after degradation.
    #[error("service degraded: {detail}")]
    ServiceDegraded { detail: String },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("conversation store failure: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn input_invalid(message: impl Into<String>) -> Self {
        Self::InputInvalid {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
