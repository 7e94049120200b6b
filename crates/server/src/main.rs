//! Voice Bridge Server Entry Point

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voice_bridge_config::{load_agent_settings, load_settings, Settings};
use voice_bridge_core::KnowledgeRetriever;
use voice_bridge_rag::{
    EmbeddingConfig, HttpEmbedder, RagError, RetrieverConfig, VectorKnowledgeRetriever,
    VectorStore, VectorStoreConfig,
};
use voice_bridge_relay::InstructionComposer;
use voice_bridge_server::{create_router, init_metrics, AppState, TwilioClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("VOICE_BRIDGE_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => {
            // Tracing not yet initialized
            eprintln!(
                "Loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        }
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);

    tracing::info!("Starting Voice Bridge Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        public_url = ?config.server.public_url,
        agent_url = %config.agent.url,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        init_metrics()?;
        tracing::info!("Initialized Prometheus metrics at /metrics");
    }

    let agent_settings = match load_agent_settings(&config.agent.settings_path) {
        Ok(settings) => Some(settings),
        Err(e) => {
            tracing::warn!(
                path = %config.agent.settings_path,
                "Agent settings not loaded: {}. Connecting without a settings message.",
                e
            );
            None
        }
    };

    let composer = InstructionComposer::from_persona(&config.persona)?;

    let mut state = AppState::new(config.clone(), agent_settings).with_composer(composer);

    if config.rag.enabled {
        tracing::info!("Initializing knowledge retrieval...");
        match init_retrieval(&config).await {
            Ok((store, retriever)) => {
                tracing::info!(
                    endpoint = %config.rag.qdrant_endpoint,
                    collection = %config.rag.qdrant_collection,
                    top_k = config.rag.top_k,
                    "Knowledge retrieval initialized"
                );
                state = state.with_vector_store(store).with_retriever(retriever);
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize knowledge retrieval: {}. Using fallback context.",
                    e
                );
            }
        }
    }

    if config.telephony.has_credentials() {
        match TwilioClient::from_config(&config.telephony) {
            Ok(client) => state = state.with_caller(Arc::new(client)),
            Err(e) => tracing::warn!("Outbound calling disabled: {}", e),
        }
    } else {
        tracing::info!("Telephony credentials not set, outbound calling disabled");
    }

    tracing::info!(
        retriever = state.retriever.name(),
        outbound_calls = state.caller.is_some(),
        "Initialized application state"
    );

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("voice_bridge={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);

    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    subscriber.with(fmt_layer).init();
}

/// Embedder + Qdrant collection; fails when the collection is missing
async fn init_retrieval(
    config: &Settings,
) -> Result<(Arc<VectorStore>, Arc<dyn KnowledgeRetriever>), RagError> {
    let store = Arc::new(VectorStore::new(VectorStoreConfig::from(&config.rag))?);
    store.check_collection().await?;

    let embedder = Arc::new(HttpEmbedder::new(EmbeddingConfig::from(&config.rag))?);
    let retriever: Arc<dyn KnowledgeRetriever> = Arc::new(VectorKnowledgeRetriever::new(
        embedder,
        store.clone(),
        RetrieverConfig::from(&config.rag),
    ));

    Ok((store, retriever))
}
