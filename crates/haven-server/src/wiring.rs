//! Service construction and composition
//!
//! Every component takes its configuration as a value at construction;
//! nothing here reads globals after startup.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use haven_llm::{
    shared_http_client, AnthropicProvider, GatewayConfig, LlmGateway, OllamaProvider,
    OpenAiProvider, ProviderSettings,
};
use haven_orchestrator::{
    CatalogDirectory, KnowledgeBase, MemoryConversationStore, Orchestrator, OrchestratorConfig,
    PropertyDetailHandler, RegistryClient, ServiceDirectory, SqliteConversationStore,
    StaticDirectory,
};
use haven_rag::{RagConfig, RagPipeline};
use haven_registry::{HealthProber, ProberConfig, ServiceCatalog};
use haven_retrieval::http_engine::HttpSearchEngine;
use haven_retrieval::{FixtureEngine, RetrievalConfig, RetrievalGateway, SearchEngine};
use haven_types::{PropertyFields, RetrievedDocument};

use crate::ServiceArgs;

/// Startup failures, split by exit code
#[derive(Debug)]
pub enum ServerError {
    Config(String),
    Internal(String),
}

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

pub fn registry_app(args: &ServiceArgs) -> Router {
    let catalog = ServiceCatalog::new();
    spawn_prober(args, catalog.clone());
    haven_registry::router(catalog)
}

fn spawn_prober(args: &ServiceArgs, catalog: ServiceCatalog) {
    let prober = HealthProber::new(
        catalog,
        ProberConfig {
            interval: Duration::from_secs(args.health_probe_interval_seconds),
            timeout: Duration::from_secs(args.health_probe_timeout_seconds),
            eviction_failures: args.health_eviction_failures,
        },
    );
    prober.spawn();
}

fn build_llm_gateway(args: &ServiceArgs) -> Result<LlmGateway, ServerError> {
    let mut config = GatewayConfig {
        breaker: haven_llm::CircuitBreakerConfig {
            failure_threshold: args.circuit_breaker_fail_threshold,
            reset_timeout: Duration::from_secs(args.circuit_breaker_reset_seconds),
        },
        call_timeout: CALL_TIMEOUT,
        ..GatewayConfig::default()
    };

    if let Some(primary) = &args.llm_primary_provider {
        let fallbacks: Vec<String> = args
            .llm_fallback_providers
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        config = config.with_provider_order(primary, &fallbacks);
    }

    let client =
        shared_http_client(CALL_TIMEOUT).map_err(|e| ServerError::Config(e.to_string()))?;

    let mut gateway = LlmGateway::new(config);
    if let Some(key) = &args.openai_api_key {
        let settings = ProviderSettings::new("https://api.openai.com/v1", client.clone())
            .with_api_key(key.clone());
        gateway.register_provider(Arc::new(OpenAiProvider::new(settings, CALL_TIMEOUT)));
        info!("openai provider registered");
    }
    if let Some(key) = &args.anthropic_api_key {
        let settings = ProviderSettings::new("https://api.anthropic.com", client.clone())
            .with_api_key(key.clone());
        gateway.register_provider(Arc::new(AnthropicProvider::new(settings, CALL_TIMEOUT)));
        info!("anthropic provider registered");
    }
    let settings = ProviderSettings::new(args.ollama_url.clone(), client);
    gateway.register_provider(Arc::new(OllamaProvider::new(settings, CALL_TIMEOUT)));
    info!(url = %args.ollama_url, "ollama provider registered");

    Ok(gateway)
}

pub fn llm_app(args: &ServiceArgs) -> Result<Router, ServerError> {
    Ok(haven_llm::router(Arc::new(build_llm_gateway(args)?)))
}

fn build_retrieval(args: &ServiceArgs) -> Result<RetrievalGateway, ServerError> {
    let engine: Arc<dyn SearchEngine> = match &args.search_engine_url {
        Some(url) => {
            let client = shared_http_client(CALL_TIMEOUT)
                .map_err(|e| ServerError::Config(e.to_string()))?;
            info!(url, "using external search engine");
            Arc::new(HttpSearchEngine::new(url.clone(), client, CALL_TIMEOUT))
        }
        None => {
            info!("no search engine configured, serving the fixture corpus");
            Arc::new(FixtureEngine::with_documents(demo_corpus()))
        }
    };

    Ok(RetrievalGateway::new(
        engine,
        RetrievalConfig {
            default_limit: args.rag_retrieval_limit,
            breaker: haven_retrieval::CircuitBreakerConfig {
                failure_threshold: args.circuit_breaker_fail_threshold,
                reset_timeout: Duration::from_secs(args.circuit_breaker_reset_seconds),
            },
            ..RetrievalConfig::default()
        },
    ))
}

pub fn retrieval_app(args: &ServiceArgs) -> Result<Router, ServerError> {
    Ok(haven_retrieval::router(Arc::new(build_retrieval(args)?)))
}

async fn build_orchestrator(
    args: &ServiceArgs,
    directory: Arc<dyn ServiceDirectory>,
) -> Result<Orchestrator, ServerError> {
    let llm = Arc::new(build_llm_gateway(args)?);
    let retrieval = Arc::new(build_retrieval(args)?);

    let rag = Arc::new(RagPipeline::new(
        llm.clone(),
        retrieval.clone(),
        RagConfig {
            retrieval_limit: args.rag_retrieval_limit,
            grader_threshold: args.rag_grader_threshold,
            reflection_threshold: args.rag_reflection_threshold,
            enable_hyde: args.rag_enable_hyde,
            enable_decomposition: args.rag_enable_decomposition,
            enable_reflection: args.rag_enable_reflection,
            ..RagConfig::default()
        },
    ));

    let store: Arc<dyn haven_orchestrator::ConversationStore> = match &args.database_url {
        Some(url) => Arc::new(
            SqliteConversationStore::connect(url, 10, 100)
                .await
                .map_err(|e| ServerError::Config(e.to_string()))?,
        ),
        None => Arc::new(MemoryConversationStore::new()),
    };

    let knowledge = match &args.knowledge_base_path {
        Some(path) => KnowledgeBase::from_file(path)
            .await
            .map_err(|e| ServerError::Config(e.to_string()))?,
        None => KnowledgeBase::builtin(),
    };

    let detail = PropertyDetailHandler::new(retrieval, 0.01);

    Ok(Orchestrator::new(
        llm,
        rag,
        detail,
        store,
        directory,
        knowledge,
        OrchestratorConfig {
            max_query_length: args.max_query_length,
            history_window: args.conversation_history_window,
            last_retrieved_k: args.conversation_last_retrieved_k,
            ..OrchestratorConfig::default()
        },
    ))
}

pub async fn orchestrator_app(args: &ServiceArgs) -> Result<Router, ServerError> {
    let directory: Arc<dyn ServiceDirectory> = match &args.registry_url {
        Some(url) => {
            let client = shared_http_client(Duration::from_secs(5))
                .map_err(|e| ServerError::Config(e.to_string()))?;
            Arc::new(RegistryClient::new(url.clone(), client))
        }
        None => Arc::new(StaticDirectory::all_healthy()),
    };
    let orchestrator = build_orchestrator(args, directory).await?;
    Ok(haven_orchestrator::router(Arc::new(orchestrator)))
}

/// Single-process composition: registry at `/registry`, gateways at
/// `/llm` and `/retrieval`, orchestrator at the root.
pub async fn all_in_one_app(args: &ServiceArgs) -> Result<Router, ServerError> {
    let catalog = ServiceCatalog::new();
    spawn_prober(args, catalog.clone());
    self_register(args, &catalog).await?;

    let llm = Arc::new(build_llm_gateway(args)?);
    let retrieval_gateway = Arc::new(build_retrieval(args)?);
    let directory: Arc<dyn ServiceDirectory> = Arc::new(CatalogDirectory::new(catalog.clone()));
    let orchestrator = build_orchestrator(args, directory).await?;

    Ok(Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "healthy" })) }))
        .nest("/registry", haven_registry::router(catalog))
        .nest("/llm", haven_llm::router(llm))
        .nest("/retrieval", haven_retrieval::router(retrieval_gateway))
        .merge(haven_orchestrator::router(Arc::new(orchestrator))))
}

/// Register this process's own services so discovery works the same in
/// single-process runs. Registration is an explicit startup step, never
/// a construction side effect.
async fn self_register(args: &ServiceArgs, catalog: &ServiceCatalog) -> Result<(), ServerError> {
    let addr: std::net::SocketAddr = args
        .bind
        .parse()
        .map_err(|e| ServerError::Config(format!("bad bind address: {e}")))?;
    let host = if addr.ip().is_unspecified() {
        "127.0.0.1".to_string()
    } else {
        addr.ip().to_string()
    };

    for (name, capability) in [
        ("llm-gateway", "llm"),
        ("retrieval-gateway", "retrieval"),
        ("orchestrator", "orchestrate"),
    ] {
        catalog
            .register(
                name,
                &host,
                addr.port(),
                env!("CARGO_PKG_VERSION"),
                vec![capability.to_string()],
            )
            .await
            .map_err(|e| ServerError::Config(e.to_string()))?;
    }
    Ok(())
}

/// Build the self-registration client for a standalone service when a
/// registry is configured. The `all` mode registers in-process instead.
pub fn registration_for(
    service: &str,
    args: &ServiceArgs,
) -> Option<(haven_registry::RegistrationClient, &'static str)> {
    let capability = match service {
        "llm-gateway" => "llm",
        "retrieval-gateway" => "retrieval",
        "orchestrator" => "orchestrate",
        _ => return None,
    };
    let registry_url = args.registry_url.as_ref()?;
    let client = shared_http_client(Duration::from_secs(5)).ok()?;
    Some((
        haven_registry::RegistrationClient::new(registry_url.clone(), client),
        capability,
    ))
}

fn demo_corpus() -> Vec<RetrievedDocument> {
    vec![
        RetrievedDocument::new("hv-101", "Căn hộ 2 phòng ngủ Sunrise City Quận 7").with_fields(
            PropertyFields {
                price: Some(2_850_000_000.0),
                area: Some(71.0),
                bedrooms: Some(2),
                bathrooms: Some(2),
                district: Some("Quận 7".to_string()),
                city: Some("Hồ Chí Minh".to_string()),
                listing_type: Some(haven_types::ListingType::Sale),
                property_type: Some("apartment".to_string()),
                features: vec!["balcony".to_string(), "pool".to_string()],
            },
        ),
        RetrievedDocument::new("hv-102", "Căn hộ 3 phòng ngủ Riverside Quận 7").with_fields(
            PropertyFields {
                price: Some(4_200_000_000.0),
                area: Some(95.0),
                bedrooms: Some(3),
                bathrooms: Some(2),
                district: Some("Quận 7".to_string()),
                city: Some("Hồ Chí Minh".to_string()),
                listing_type: Some(haven_types::ListingType::Sale),
                property_type: Some("apartment".to_string()),
                features: vec!["river view".to_string()],
            },
        ),
        RetrievedDocument::new("hv-103", "Nhà phố Thảo Điền Quận 2").with_fields(PropertyFields {
            price: Some(12_500_000_000.0),
            area: Some(160.0),
            bedrooms: Some(4),
            bathrooms: Some(3),
            district: Some("Quận 2".to_string()),
            city: Some("Hồ Chí Minh".to_string()),
            listing_type: Some(haven_types::ListingType::Sale),
            property_type: Some("townhouse".to_string()),
            features: vec!["garage".to_string(), "garden".to_string()],
        }),
        RetrievedDocument::new("hv-104", "Studio cho thuê Quận 1").with_fields(PropertyFields {
            price: Some(12_000_000.0),
            area: Some(35.0),
            bedrooms: Some(1),
            bathrooms: Some(1),
            district: Some("Quận 1".to_string()),
            city: Some("Hồ Chí Minh".to_string()),
            listing_type: Some(haven_types::ListingType::Rent),
            property_type: Some("studio".to_string()),
            features: vec!["furnished".to_string()],
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> ServiceArgs {
        let mut argv = vec!["haven-server", "all"];
        argv.extend_from_slice(extra);
        match crate::Cli::try_parse_from(argv).unwrap().command {
            crate::Command::All(args) => args,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn all_in_one_app_builds_with_defaults() {
        let app = all_in_one_app(&args(&["--bind", "127.0.0.1:8080"])).await;
        assert!(app.is_ok());
    }

    #[tokio::test]
    async fn self_registration_populates_the_catalog() {
        let catalog = ServiceCatalog::new();
        self_register(&args(&["--bind", "0.0.0.0:9090"]), &catalog)
            .await
            .unwrap();

        let stats = catalog.stats().await;
        assert_eq!(stats.total, 3);
        let llm = catalog.get("llm-gateway").await.unwrap();
        assert_eq!(llm.url, "http://127.0.0.1:9090");
        assert!(llm.has_capability("llm"));
    }

    #[test]
    fn provider_order_flags_reorder_the_chat_chain() {
        let args = args(&[
            "--llm-primary-provider",
            "ollama",
            "--llm-fallback-providers",
            "openai,anthropic",
        ]);
        let gateway = build_llm_gateway(&args).unwrap();
        let routes = gateway.config().routing.resolve("primary-chat").unwrap();
        assert_eq!(routes[0].provider, "ollama");
        assert_eq!(routes[1].provider, "openai");
        assert_eq!(routes[2].provider, "anthropic");
    }

    #[test]
    fn bad_bind_address_is_a_config_error() {
        let result: Result<std::net::SocketAddr, _> = "not-an-addr".parse();
        assert!(result.is_err());
    }
}
