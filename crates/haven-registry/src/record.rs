//! Service records held by the catalog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Liveness status of a registered service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Unhealthy => "unhealthy",
            ServiceStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ServiceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "healthy" => Ok(ServiceStatus::Healthy),
            "unhealthy" => Ok(ServiceStatus::Unhealthy),
            "unknown" => Ok(ServiceStatus::Unknown),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// A registered service.
///
/// `name` is globally unique at any instant; `url` is always derived from
/// host and port. Status stays `Unknown` until the first probe after
/// registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub url: String,
    pub version: String,
    pub capabilities: BTreeSet<String>,
    pub registered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub status: ServiceStatus,
}

impl ServiceRecord {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        version: impl Into<String>,
        capabilities: impl IntoIterator<Item = String>,
    ) -> Self {
        let host = host.into();
        let url = format!("http://{host}:{port}");
        Self {
            name: name.into(),
            host,
            port,
            url,
            version: version.into(),
            capabilities: capabilities.into_iter().collect(),
            registered_at: Utc::now(),
            last_heartbeat: None,
            status: ServiceStatus::Unknown,
        }
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_derived_from_host_and_port() {
        let record = ServiceRecord::new("llm-gateway", "10.0.0.5", 8082, "1.0.0", []);
        assert_eq!(record.url, "http://10.0.0.5:8082");
    }

    #[test]
    fn capability_match_is_exact_and_case_sensitive() {
        let record = ServiceRecord::new(
            "llm-gateway",
            "localhost",
            8082,
            "1.0.0",
            ["llm".to_string()],
        );
        assert!(record.has_capability("llm"));
        assert!(!record.has_capability("LLM"));
        assert!(!record.has_capability("llm-chat"));
    }

    #[test]
    fn fresh_record_starts_unknown_without_heartbeat() {
        let record = ServiceRecord::new("orchestrator", "localhost", 8080, "1.0.0", []);
        assert_eq!(record.status, ServiceStatus::Unknown);
        assert!(record.last_heartbeat.is_none());
    }
}
