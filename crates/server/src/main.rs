//! Doublons API server entry point

use std::net::SocketAddr;
use std::sync::Arc;

use doublons_common::{
    config::AppConfig,
    metrics::register_metrics,
    store::{DbPool, PgStore},
    MemStore, SharedStore,
};
use doublons_server::{create_router, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(&config);
    info!("Starting Doublons API server v{}", doublons_common::VERSION);

    register_metrics();
    if config.observability.metrics_port > 0 {
        let metrics_addr =
            SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }

    let config = Arc::new(config);

    let store: SharedStore = if config.use_memory_store() {
        warn!("Using in-memory store; data will not survive a restart");
        Arc::new(MemStore::new())
    } else {
        info!("Connecting to database...");
        let pool = DbPool::new(&config.database).await?;
        Arc::new(PgStore::new(pool))
    };

    let state = AppState::new(config.clone(), store);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));

    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
