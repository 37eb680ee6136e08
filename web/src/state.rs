//! Application state for Axum handlers.

use std::sync::Arc;
use wild_rydes_core::environment::RandomSource;
use wild_rydes_runtime::RideDispatcher;

/// State of the ride API.
#[derive(Clone)]
pub struct RideApiState {
    /// Handles `POST /ride`
    pub dispatcher: Arc<RideDispatcher>,
}

impl RideApiState {
    /// Create a new ride API state.
    #[must_use]
    pub fn new(dispatcher: RideDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// Probability that the receipt service accepts a receipt.
pub const DEFAULT_SUCCESS_RATE: f64 = 0.5;

/// State of the receipt post-processing service.
#[derive(Clone)]
pub struct ReceiptServiceState {
    /// Source of the accept/reject draw
    pub random: Arc<dyn RandomSource>,
    /// A draw strictly below this accepts the receipt
    pub success_rate: f64,
}

impl ReceiptServiceState {
    /// Create a new receipt service state.
    #[must_use]
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self {
            random,
            success_rate: DEFAULT_SUCCESS_RATE,
        }
    }
}
