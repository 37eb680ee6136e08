//! Ride API server.
//!
//! Serves `POST /ride` and runs the dispatch workflow behind it.
//!
//! # Usage
//!
//! ```bash
//! UNICORN_STABLE_API=stable.example.com/prod cargo run --bin ride-api
//! ```

use tokio::net::TcpListener;
use wild_rydes::lifecycle::init_tracing;
use wild_rydes::{Config, RideApi};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    init_tracing();
    tracing::info!("Starting Wild Rydes ride API...");

    let config = Config::from_env();
    if config.dispatch.directory_endpoint.is_none() {
        tracing::warn!("UNICORN_STABLE_API is not set; every ride request will fail");
    }
    tracing::info!(
        address = %config.server.address(),
        receipt_service = %config.receipt.post_processing_url,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(config.server.address()).await?;
    RideApi::build(&config).run(listener).await?;

    tracing::info!("Ride API stopped");
    Ok(())
}
