//! Ride request endpoint.

use crate::error::AppError;
use crate::WebResult;
use crate::extractors::Identity;
use crate::middleware::RequestReference;
use crate::state::RideApiState;
use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::StatusCode,
};
use wild_rydes_core::types::RideResponse;
use wild_rydes_runtime::DispatchResponse;
use wild_rydes_runtime::metrics::DispatchMetrics;

/// Request a ride.
///
/// # Endpoint
///
/// ```text
/// POST /ride
/// X-Authorizer-Claims: {"cognito:username": "...", "email": "..."}
/// ```
///
/// # Request Body
///
/// ```json
/// { "PickupLocation": { "Latitude": 47.6, "Longitude": -122.3 } }
/// ```
///
/// # Response
///
/// `201 {RideId, RideDetail, EtaInSeconds, Rider}` or
/// `500 {Error, Reference}`. The body is taken raw so that a malformed
/// payload is reported in the same `500` shape as any other failure.
///
/// # Errors
///
/// Every dispatch failure becomes an [`AppError`].
pub async fn request_ride(
    State(state): State<RideApiState>,
    Identity(auth): Identity,
    reference: RequestReference,
    body: Result<Bytes, BytesRejection>,
) -> WebResult<(StatusCode, Json<RideResponse>)> {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            DispatchMetrics::record_error("malformed_request");
            return Err(AppError::internal(
                format!("Invalid ride request: {}", rejection.body_text()),
                reference.0,
            )
            .with_source(anyhow::Error::new(rejection)));
        },
    };
    let body = String::from_utf8_lossy(&body);

    match state
        .dispatcher
        .handle_request(auth.as_ref(), &body, &reference.0)
        .await
    {
        DispatchResponse::Created(ride) => Ok((StatusCode::CREATED, Json(ride))),
        DispatchResponse::Failed(error) => Err(AppError::from(error)),
    }
}

/// Answer a CORS preflight. The headers come from the router's CORS layer.
///
/// # Endpoint
///
/// ```text
/// OPTIONS /ride
/// ```
#[allow(clippy::unused_async)]
pub async fn ride_preflight() -> StatusCode {
    StatusCode::OK
}
