//! Haven Registry - Service Discovery
//!
//! In-memory catalog of platform services with self-registration,
//! capability-indexed lookup, and a background liveness probe loop that
//! evicts services after repeated unreachability.

use thiserror::Error;

pub mod catalog;
pub mod client;
pub mod http;
pub mod prober;
pub mod record;

pub use catalog::{ProbeOutcome, RegistryStats, ServiceCatalog};
pub use client::RegistrationClient;
pub use http::router;
pub use prober::{HealthProber, ProberConfig};
pub use record::{ServiceRecord, ServiceStatus};

/// Errors surfaced by registry operations
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("service not found: {name}")]
    NotFound { name: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl RegistryError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
