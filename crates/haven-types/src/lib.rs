//! Haven Types - Shared Contracts
//!
//! Wire-level types shared by the Haven core services: conversation
//! messages, retrieved property documents, the reasoning chain attached to
//! orchestrated responses, ambiguity and knowledge-expansion records, and
//! structured response components.

pub mod ambiguity;
pub mod components;
pub mod document;
pub mod json_extract;
pub mod knowledge;
pub mod message;
pub mod reasoning;

pub use ambiguity::{AmbiguityItem, AmbiguityResult, AmbiguityType};
pub use components::ResponseComponent;
pub use document::{ListingType, PropertyFields, RetrievalSource, RetrievedDocument};
pub use json_extract::{extract_fenced_block, lenient_json};
pub use knowledge::KnowledgeExpansion;
pub use message::{Message, Role};
pub use reasoning::{ReasoningChain, Thought, ThoughtStage};
