use std::net::SocketAddr;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use agent_chat_backend::{create_app, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("agent_chat_backend=debug,tower_http=debug")),
        )
        .init();

    let config_path = Config::find_config_file();
    match &config_path {
        Some(path) => info!("Loading configuration from: {}", path),
        None => info!("No configuration file found, using environment only"),
    }

    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Connection string: {}", config.agent_service.connection_string);
    info!("Agent ID: {}", config.agent_service.agent_id);
    info!("Thread ID: {}", config.agent_service.thread_id);

    let addr: SocketAddr = format!("{}:{}", config.system_config.host, config.system_config.port)
        .parse()?;

    info!("Creating agent session...");
    let state = AppState::from_config(config).map_err(|e| {
        error!("Failed to create agent session: {}", e);
        e
    })?;
    let shutdown = state.shutdown.clone();
    let app = create_app(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
