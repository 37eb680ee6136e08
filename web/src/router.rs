//! Routers for the two HTTP services.

use crate::handlers::{health_check, post_process_receipt, request_ride, ride_preflight};
use crate::middleware::{request_reference_layer, with_cors_headers};
use crate::state::{ReceiptServiceState, RideApiState};
use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

/// Ride API: `POST /ride`, `OPTIONS /ride`, `GET /health`.
///
/// Every response carries the CORS headers and an `X-Request-ID`.
pub fn ride_router(state: RideApiState) -> Router {
    let routes = Router::new()
        .route("/ride", post(request_ride).options(ride_preflight))
        .route("/health", get(health_check))
        .with_state(state);

    with_cors_headers(routes)
        .layer(TraceLayer::new_for_http())
        .layer(request_reference_layer())
}

/// Receipt post-processing service: `PUT /api/receipts`, `GET /health`.
pub fn receipt_router(state: ReceiptServiceState) -> Router {
    Router::new()
        .route("/api/receipts", put(post_process_receipt))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(request_reference_layer())
}
