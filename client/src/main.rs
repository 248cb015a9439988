//! Tether sync agent - keeps a local cache of one principal's records in sync
//! with the record server.

use tether_client::{ClientConfig, SyncAgent};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tether_client=debug,tether_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = ClientConfig::from_env()?;

    tracing::info!(
        "Starting Tether agent for principal {} against {}",
        config.principal,
        config.base_url
    );
    tracing::info!("Local cache at {}", config.cache_dir.display());

    let agent = SyncAgent::open(config).await?;
    agent
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    tracing::info!("Agent stopped");
    Ok(())
}
