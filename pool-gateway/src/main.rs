// Pool Gateway - HTTP entry point for the pool ledger

use pool_gateway::{build_router, config::GatewayConfig, AppState};
use pool_ledger::PoolService;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .with_line_number(true)
        .init();

    info!("Starting pool gateway");

    let config = GatewayConfig::from_env()?;
    config.validate().map_err(anyhow::Error::msg)?;

    let service = Arc::new(PoolService::open(config.ledger_config()?).await?);
    let app = build_router(AppState {
        service: service.clone(),
    });

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Gateway listening on: {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown().await?;
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
