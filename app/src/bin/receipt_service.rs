//! Receipt post-processing service.
//!
//! Accepts `PUT /api/receipts` and fails on purpose about half the time, so
//! the receipt pipeline's redelivery has something to do.

use std::sync::Arc;
use tokio::net::TcpListener;
use wild_rydes::Config;
use wild_rydes::lifecycle::{init_tracing, shutdown_signal};
use wild_rydes_core::environment::ThreadRandom;
use wild_rydes_web::{ReceiptServiceState, receipt_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = Config::from_env().receipt_service;
    let mut state = ReceiptServiceState::new(Arc::new(ThreadRandom));
    state.success_rate = config.success_rate;

    let listener = TcpListener::bind(config.server.address()).await?;
    tracing::info!(
        address = %config.server.address(),
        success_rate = config.success_rate,
        "Receipt service listening"
    );

    axum::serve(listener, receipt_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Receipt service stopped");
    Ok(())
}
