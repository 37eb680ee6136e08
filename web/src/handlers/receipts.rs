//! Receipt post-processing endpoint.
//!
//! Stands in for a downstream system that fails about half the time, so
//! the receipt pipeline's redelivery path is exercised for real.

use crate::state::ReceiptServiceState;
use axum::{body::Bytes, extract::State, http::StatusCode};

/// Accept or reject a receipt on a random draw.
///
/// # Endpoint
///
/// ```text
/// PUT /api/receipts
/// ```
///
/// # Response
///
/// `200 OK` when the draw is below the success rate, `500 BORKED`
/// otherwise. The body is not inspected.
#[allow(clippy::unused_async)]
pub async fn post_process_receipt(
    State(state): State<ReceiptServiceState>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let draw = state.random.unit();
    if draw < state.success_rate {
        tracing::info!(bytes = body.len(), "Receipt post-processed");
        (StatusCode::OK, "OK")
    } else {
        tracing::warn!(bytes = body.len(), draw, "Receipt post-processing failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "BORKED")
    }
}
