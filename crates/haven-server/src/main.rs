//! Haven platform server
//!
//! One binary, one subcommand per core service, plus an `all` mode that
//! mounts every service in a single process for local runs. CLI flags
//! are a superset of the recognized environment variables.
//!
//! Exit codes: 0 on clean shutdown, 2 on configuration errors, 70 on
//! unhandled internal errors.

mod wiring;

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::net::SocketAddr;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "haven-server")]
#[command(about = "Haven real-estate AI platform services")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the service registry
    Registry(ServiceArgs),
    /// Run the LLM gateway
    Llm(ServiceArgs),
    /// Run the retrieval gateway
    Retrieval(ServiceArgs),
    /// Run the orchestrator
    Orchestrator(ServiceArgs),
    /// Run every service in one process
    All(ServiceArgs),
}

#[derive(ClapArgs, Clone)]
struct ServiceArgs {
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: String,

    #[arg(long, env = "REGISTRY_URL")]
    registry_url: Option<String>,

    #[arg(long, env = "LLM_GATEWAY_URL")]
    llm_gateway_url: Option<String>,

    #[arg(long, env = "RETRIEVAL_GATEWAY_URL")]
    retrieval_gateway_url: Option<String>,

    /// Base URL of the hybrid search engine; omitted means the built-in
    /// fixture corpus.
    #[arg(long, env = "SEARCH_ENGINE_URL")]
    search_engine_url: Option<String>,

    /// SQLite URL for conversation state; omitted means in-memory.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// JSON file with knowledge-base entries; omitted means builtin.
    #[arg(long, env = "KNOWLEDGE_BASE_PATH")]
    knowledge_base_path: Option<String>,

    #[arg(long, env = "LLM_PRIMARY_PROVIDER")]
    llm_primary_provider: Option<String>,

    /// Comma-separated ordered fallback list.
    #[arg(long, env = "LLM_FALLBACK_PROVIDERS")]
    llm_fallback_providers: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_api_key: Option<String>,

    #[arg(long, env = "OLLAMA_URL", default_value = "http://localhost:11434")]
    ollama_url: String,

    #[arg(long, env = "HEALTH_PROBE_INTERVAL_SECONDS", default_value_t = 30)]
    health_probe_interval_seconds: u64,

    #[arg(long, env = "HEALTH_PROBE_TIMEOUT_SECONDS", default_value_t = 5)]
    health_probe_timeout_seconds: u64,

    #[arg(long, env = "HEALTH_EVICTION_FAILURES", default_value_t = 3)]
    health_eviction_failures: u32,

    #[arg(long, env = "CIRCUIT_BREAKER_FAIL_THRESHOLD", default_value_t = 5)]
    circuit_breaker_fail_threshold: u32,

    #[arg(long, env = "CIRCUIT_BREAKER_RESET_SECONDS", default_value_t = 60)]
    circuit_breaker_reset_seconds: u64,

    #[arg(long, env = "RAG_RETRIEVAL_LIMIT", default_value_t = 20)]
    rag_retrieval_limit: usize,

    #[arg(long, env = "RAG_GRADER_THRESHOLD", default_value_t = 0.5)]
    rag_grader_threshold: f64,

    #[arg(long, env = "RAG_REFLECTION_THRESHOLD", default_value_t = 0.7)]
    rag_reflection_threshold: f64,

    #[arg(long, env = "RAG_ENABLE_HYDE", default_value_t = false)]
    rag_enable_hyde: bool,

    #[arg(long, env = "RAG_ENABLE_DECOMPOSITION", default_value_t = false)]
    rag_enable_decomposition: bool,

    #[arg(long, env = "RAG_ENABLE_REFLECTION", default_value_t = true)]
    rag_enable_reflection: bool,

    #[arg(long, env = "CONVERSATION_HISTORY_WINDOW", default_value_t = 10)]
    conversation_history_window: usize,

    #[arg(long, env = "CONVERSATION_LAST_RETRIEVED_K", default_value_t = 5)]
    conversation_last_retrieved_k: usize,

    #[arg(long, env = "MAX_QUERY_LENGTH", default_value_t = 500)]
    max_query_length: usize,
}

const EXIT_CONFIG: u8 = 2;
const EXIT_INTERNAL: u8 = 70;

#[tokio::main]
async fn main() -> ExitCode {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(wiring::ServerError::Config(message)) => {
            error!(message, "configuration error");
            ExitCode::from(EXIT_CONFIG)
        }
        Err(wiring::ServerError::Internal(message)) => {
            error!(message, "unhandled internal error");
            ExitCode::from(EXIT_INTERNAL)
        }
    }
}

async fn run(cli: Cli) -> Result<(), wiring::ServerError> {
    let (name, args, app) = match cli.command {
        Command::Registry(args) => {
            let app = wiring::registry_app(&args);
            ("registry", args, app)
        }
        Command::Llm(args) => {
            let app = wiring::llm_app(&args)?;
            ("llm-gateway", args, app)
        }
        Command::Retrieval(args) => {
            let app = wiring::retrieval_app(&args)?;
            ("retrieval-gateway", args, app)
        }
        Command::Orchestrator(args) => {
            let app = wiring::orchestrator_app(&args).await?;
            ("orchestrator", args, app)
        }
        Command::All(args) => {
            let app = wiring::all_in_one_app(&args).await?;
            ("all-in-one", args, app)
        }
    };

    let addr: SocketAddr = args
        .bind
        .parse()
        .map_err(|e| wiring::ServerError::Config(format!("bad bind address: {e}")))?;

    info!(
        service = name,
        version = env!("CARGO_PKG_VERSION"),
        %addr,
        "starting haven service"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| wiring::ServerError::Config(format!("cannot bind {addr}: {e}")))?;

    // Standalone services announce themselves to the registry once the
    // listener is up; registration failures are logged, not fatal.
    let registration = wiring::registration_for(name, &args);
    if let Some((client, capability)) = &registration {
        let host = if addr.ip().is_unspecified() {
            "127.0.0.1".to_string()
        } else {
            addr.ip().to_string()
        };
        if let Err(error) = client
            .register(name, &host, addr.port(), env!("CARGO_PKG_VERSION"), &[*capability])
            .await
        {
            tracing::warn!(error = %error, "self-registration failed, continuing without it");
        }
    }

    let app = app.layer(tower_http::trace::TraceLayer::new_for_http());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| wiring::ServerError::Internal(e.to_string()))?;

    if let Some((client, _)) = &registration {
        client.deregister(name).await;
    }

    info!(service = name, "shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
