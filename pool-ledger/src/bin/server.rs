//! Pool ledger server binary

use pool_ledger::{Config, PoolService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting pool ledger");

    let config = Config::from_env()?;
    let observed: Vec<String> = config.observed_txs.iter().map(|tx| tx.hash.clone()).collect();

    let service = PoolService::open(config).await?;
    tracing::info!("Pool service opened successfully");

    // Replay observed transactions; already-applied ones are rejected as replays
    for hash in observed {
        let outcome = service.submit(hash.as_bytes()).await?;
        tracing::info!(tx_hash = %hash, outcome = %outcome.state(), "Processed observed transaction");
    }

    for pool in service.query().pools() {
        tracing::info!(pool_id = %pool.pool_id, status = %pool.status, "Pool");
    }

    tokio::signal::ctrl_c().await?;

    service.shutdown().await?;
    tracing::info!("Pool ledger stopped");
    Ok(())
}
