//! The in-memory service catalog
//!
//! Writers take the catalog lock briefly; readers work on cloned
//! snapshots so enumeration never blocks registration.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::record::{ServiceRecord, ServiceStatus};
use crate::{RegistryError, Result};

/// Outcome of one liveness probe against a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 2xx response with body `status == "healthy"`
    Healthy,
    /// Any other response
    Unhealthy,
    /// No response at all (timeout, refused connection)
    Unreachable,
}

/// Aggregate counts over the catalog
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryStats {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    record: ServiceRecord,
    consecutive_unreachable: u32,
}

/// Thread-safe catalog of registered services
#[derive(Clone, Default)]
pub struct ServiceCatalog {
    entries: Arc<RwLock<HashMap<String, CatalogEntry>>>,
}

impl ServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a service entry.
    ///
    /// Re-registration overwrites the existing record and resets status
    /// to `Unknown` until the next probe.
    pub async fn register(
        &self,
        name: &str,
        host: &str,
        port: u16,
        version: &str,
        capabilities: Vec<String>,
    ) -> Result<ServiceRecord> {
        if name.trim().is_empty() {
            return Err(RegistryError::invalid("service name must not be empty"));
        }
        if host.trim().is_empty() {
            return Err(RegistryError::invalid("service host must not be empty"));
        }
        if port == 0 {
            return Err(RegistryError::invalid("service port must be nonzero"));
        }

        let record = ServiceRecord::new(name, host, port, version, capabilities);
        let mut entries = self.entries.write().await;
        if entries.contains_key(name) {
            warn!(service = name, "re-registration replaces existing entry");
        } else {
            info!(service = name, url = %record.url, "service registered");
        }
        entries.insert(
            name.to_string(),
            CatalogEntry {
                record: record.clone(),
                consecutive_unreachable: 0,
            },
        );
        Ok(record)
    }

    /// Remove a service. Idempotent.
    pub async fn deregister(&self, name: &str) {
        let mut entries = self.entries.write().await;
        if entries.remove(name).is_some() {
            info!(service = name, "service deregistered");
        }
    }

    /// Filtered enumeration over a snapshot of the catalog.
    pub async fn list(
        &self,
        capability: Option<&str>,
        status: Option<ServiceStatus>,
    ) -> Vec<ServiceRecord> {
        let entries = self.entries.read().await;
        let mut records: Vec<ServiceRecord> = entries
            .values()
            .filter(|e| capability.map_or(true, |c| e.record.has_capability(c)))
            .filter(|e| status.map_or(true, |s| e.record.status == s))
            .map(|e| e.record.clone())
            .collect();
        // Order is unspecified but must be stable within one call
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    pub async fn get(&self, name: &str) -> Result<ServiceRecord> {
        let entries = self.entries.read().await;
        entries
            .get(name)
            .map(|e| e.record.clone())
            .ok_or_else(|| RegistryError::not_found(name))
    }

    /// Update the last-heartbeat timestamp. Does not by itself mark the
    /// service healthy.
    pub async fn heartbeat(&self, name: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| RegistryError::not_found(name))?;
        entry.record.last_heartbeat = Some(Utc::now());
        Ok(())
    }

    pub async fn stats(&self) -> RegistryStats {
        let entries = self.entries.read().await;
        let mut stats = RegistryStats {
            total: entries.len(),
            ..Default::default()
        };
        for entry in entries.values() {
            match entry.record.status {
                ServiceStatus::Healthy => stats.healthy += 1,
                ServiceStatus::Unhealthy => stats.unhealthy += 1,
                ServiceStatus::Unknown => stats.unknown += 1,
            }
        }
        stats
    }

    /// Snapshot of every record, for the probe loop.
    pub async fn snapshot(&self) -> Vec<ServiceRecord> {
        let entries = self.entries.read().await;
        entries.values().map(|e| e.record.clone()).collect()
    }

    /// Apply one probe outcome. Returns `true` when the entry was evicted
    /// after `eviction_failures` consecutive unreachable probes.
    ///
    /// Each service is probed once per cycle, so the status written here
    /// is final for the cycle.
    pub async fn apply_probe(
        &self,
        name: &str,
        outcome: ProbeOutcome,
        eviction_failures: u32,
    ) -> bool {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(name) else {
            // Deregistered while the probe was in flight
            return false;
        };

        match outcome {
            ProbeOutcome::Healthy => {
                entry.record.status = ServiceStatus::Healthy;
                entry.consecutive_unreachable = 0;
            }
            ProbeOutcome::Unhealthy => {
                entry.record.status = ServiceStatus::Unhealthy;
                entry.consecutive_unreachable = 0;
            }
            ProbeOutcome::Unreachable => {
                entry.record.status = ServiceStatus::Unhealthy;
                entry.consecutive_unreachable += 1;
                if entry.consecutive_unreachable >= eviction_failures {
                    warn!(
                        service = name,
                        failures = entry.consecutive_unreachable,
                        "evicting unreachable service"
                    );
                    entries.remove(name);
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_deregister_leaves_list_unchanged() {
        let catalog = ServiceCatalog::new();
        let before = catalog.list(None, None).await;

        catalog
            .register("tmp", "localhost", 9000, "0.1.0", vec![])
            .await
            .unwrap();
        catalog.deregister("tmp").await;

        let after = catalog.list(None, None).await;
        assert_eq!(before.len(), after.len());
    }

    #[tokio::test]
    async fn register_rejects_invalid_arguments() {
        let catalog = ServiceCatalog::new();
        assert!(catalog
            .register("", "localhost", 9000, "0.1.0", vec![])
            .await
            .is_err());
        assert!(catalog
            .register("svc", "", 9000, "0.1.0", vec![])
            .await
            .is_err());
        assert!(catalog
            .register("svc", "localhost", 0, "0.1.0", vec![])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn reregistration_resets_status_to_unknown() {
        let catalog = ServiceCatalog::new();
        catalog
            .register("svc", "localhost", 9000, "0.1.0", vec![])
            .await
            .unwrap();
        catalog
            .apply_probe("svc", ProbeOutcome::Healthy, 3)
            .await;
        assert_eq!(
            catalog.get("svc").await.unwrap().status,
            ServiceStatus::Healthy
        );

        catalog
            .register("svc", "localhost", 9001, "0.2.0", vec![])
            .await
            .unwrap();
        let record = catalog.get("svc").await.unwrap();
        assert_eq!(record.status, ServiceStatus::Unknown);
        assert_eq!(record.port, 9001);
    }

    #[tokio::test]
    async fn list_filters_by_capability_and_status() {
        let catalog = ServiceCatalog::new();
        catalog
            .register("a", "localhost", 9001, "0.1.0", vec!["llm".to_string()])
            .await
            .unwrap();
        catalog
            .register("b", "localhost", 9002, "0.1.0", vec!["retrieval".to_string()])
            .await
            .unwrap();
        catalog.apply_probe("a", ProbeOutcome::Healthy, 3).await;

        let llm = catalog.list(Some("llm"), None).await;
        assert_eq!(llm.len(), 1);
        assert_eq!(llm[0].name, "a");

        let healthy = catalog.list(None, Some(ServiceStatus::Healthy)).await;
        assert_eq!(healthy.len(), 1);
        assert_eq!(healthy[0].name, "a");

        let healthy_retrieval = catalog
            .list(Some("retrieval"), Some(ServiceStatus::Healthy))
            .await;
        assert!(healthy_retrieval.is_empty());
    }

    #[tokio::test]
    async fn heartbeat_updates_timestamp_without_changing_status() {
        let catalog = ServiceCatalog::new();
        catalog
            .register("svc", "localhost", 9000, "0.1.0", vec![])
            .await
            .unwrap();

        catalog.heartbeat("svc").await.unwrap();
        let record = catalog.get("svc").await.unwrap();
        assert!(record.last_heartbeat.is_some());
        assert_eq!(record.status, ServiceStatus::Unknown);

        assert!(catalog.heartbeat("ghost").await.is_err());
    }

    #[tokio::test]
    async fn eviction_after_consecutive_unreachable_probes() {
        let catalog = ServiceCatalog::new();
        catalog
            .register("svc", "localhost", 9000, "0.1.0", vec![])
            .await
            .unwrap();

        assert!(!catalog.apply_probe("svc", ProbeOutcome::Unreachable, 3).await);
        assert!(!catalog.apply_probe("svc", ProbeOutcome::Unreachable, 3).await);
        // A successful response resets the unreachable streak
        assert!(!catalog.apply_probe("svc", ProbeOutcome::Unhealthy, 3).await);
        assert!(!catalog.apply_probe("svc", ProbeOutcome::Unreachable, 3).await);
        assert!(!catalog.apply_probe("svc", ProbeOutcome::Unreachable, 3).await);
        assert!(catalog.apply_probe("svc", ProbeOutcome::Unreachable, 3).await);

        assert!(catalog.get("svc").await.is_err());
        assert_eq!(catalog.stats().await.total, 0);
    }

    #[tokio::test]
    async fn stats_count_by_status() {
        let catalog = ServiceCatalog::new();
        for (name, outcome) in [
            ("a", Some(ProbeOutcome::Healthy)),
            ("b", Some(ProbeOutcome::Unhealthy)),
            ("c", None),
        ] {
            catalog
                .register(name, "localhost", 9000, "0.1.0", vec![])
                .await
                .unwrap();
            if let Some(outcome) = outcome {
                catalog.apply_probe(name, outcome, 3).await;
            }
        }

        let stats = catalog.stats().await;
        assert_eq!(stats.total, 3);
        assert_eq!(stats.healthy, 1);
        assert_eq!(stats.unhealthy, 1);
        assert_eq!(stats.unknown, 1);
    }
}
