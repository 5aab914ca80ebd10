use anyhow::{Context, Result};
use presence::api::create_router;
use presence::config;
use presence::hub::{Hub, Relay, SessionRegistry};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "presence=info".into()),
        )
        .init();

    info!("Presence relay starting...");

    let config_path =
        std::env::var("PRESENCE_CONFIG").unwrap_or_else(|_| "presence.toml".to_string());
    let config = config::load_or_default(&config_path)?;

    let registry = Arc::new(SessionRegistry::new());
    let relay = Relay::new(Arc::clone(&registry), config.relay.clone());
    let (hub, hub_task) = Hub::spawn(relay);

    let app = create_router(hub.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "Listening");

    let shutdown_hub = hub.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            shutdown_hub.shutdown();
        })
        .await
        .context("HTTP server error")?;

    hub.shutdown();
    if let Err(e) = hub_task.await {
        error!(error = %e, "Hub task failed");
    }

    info!("Presence relay stopped");
    Ok(())
}
