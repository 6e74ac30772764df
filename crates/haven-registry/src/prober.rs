//! Background liveness probing
//!
//! Every probe cycle issues `GET <url>/health` to all registered services
//! in parallel. A 2xx response whose body reports `status == "healthy"`
//! marks the service healthy; any other response marks it unhealthy; no
//! response at all counts toward eviction.

use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::catalog::{ProbeOutcome, ServiceCatalog};

/// Probe loop configuration
#[derive(Debug, Clone)]
pub struct ProberConfig {
    /// Seconds between probe cycles
    pub interval: Duration,
    /// Per-probe request timeout
    pub timeout: Duration,
    /// Consecutive unreachable probes before eviction
    pub eviction_failures: u32,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            eviction_failures: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    #[serde(default)]
    status: String,
}

/// Health prober that drives the catalog's probe cycle
pub struct HealthProber {
    catalog: ServiceCatalog,
    client: reqwest::Client,
    config: ProberConfig,
}

impl HealthProber {
    pub fn new(catalog: ServiceCatalog, config: ProberConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            catalog,
            client,
            config,
        }
    }

    /// Spawn the probe loop as a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so freshly
            // registered services get a full interval before probing.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.run_cycle().await;
            }
        })
    }

    /// Probe every registered service once, in parallel, and apply the
    /// outcomes.
    pub async fn run_cycle(&self) {
        let services = self.catalog.snapshot().await;
        if services.is_empty() {
            return;
        }
        debug!(count = services.len(), "starting probe cycle");

        let probes = services.iter().map(|record| {
            let client = self.client.clone();
            let url = format!("{}/health", record.url);
            let name = record.name.clone();
            async move {
                let outcome = probe_once(&client, &url).await;
                (name, outcome)
            }
        });

        let outcomes = futures::future::join_all(probes).await;
        for (name, outcome) in outcomes {
            let evicted = self
                .catalog
                .apply_probe(&name, outcome, self.config.eviction_failures)
                .await;
            if evicted {
                info!(service = %name, "service evicted after repeated unreachability");
            }
        }
    }
}

async fn probe_once(client: &reqwest::Client, url: &str) -> ProbeOutcome {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(_) => return ProbeOutcome::Unreachable,
    };

    if !response.status().is_success() {
        return ProbeOutcome::Unhealthy;
    }

    match response.json::<HealthBody>().await {
        Ok(body) if body.status == "healthy" => ProbeOutcome::Healthy,
        _ => ProbeOutcome::Unhealthy,
    }
}
