//! Ride dispatch orchestration.
//!
//! A request moves through a fixed sequence of phases:
//!
//! ```text
//! Received → Authorized → WorkerSelected → LeaseAttempted → EventPublished → Responded
//! ```
//!
//! Any failure jumps straight to `Responded` with a `500`. An occupied
//! worker is not a failure: the ride continues with an empty detail and
//! still answers `201`.

use crate::lease::LeaseManager;
use crate::metrics::DispatchMetrics;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::Instrument;
use wild_rydes_core::config::DispatchConfig;
use wild_rydes_core::environment::{Clock, RandomSource};
use wild_rydes_core::error::{DirectoryError, DispatchError, StoreError};
use wild_rydes_core::event::SerializedEvent;
use wild_rydes_core::event_bus::{EventBus, EventBusError};
use wild_rydes_core::services::WorkerDirectory;
use wild_rydes_core::types::{
    AuthContext, ErrorResponse, LeaseOutcome, RideDetail, RideDispatchEvent, RideId, RideRequest,
    RideRequestBody, RideResponse,
};

/// Label used for lease store timeouts.
const LEASE_STORE: &str = "lease-store";

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    /// Request accepted by the API
    Received,
    /// Identity resolved
    Authorized,
    /// Candidate worker returned by the directory
    WorkerSelected,
    /// Reservation attempted, reserved or not
    LeaseAttempted,
    /// Dispatch event accepted by the bus
    EventPublished,
    /// Response produced
    Responded,
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Authorized => "authorized",
            Self::WorkerSelected => "worker_selected",
            Self::LeaseAttempted => "lease_attempted",
            Self::EventPublished => "event_published",
            Self::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// What the ride API answers.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResponse {
    /// `201` with the ride
    Created(RideResponse),
    /// `500` with the error and the request reference
    Failed(ErrorResponse),
}

impl DispatchResponse {
    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Created(_) => 201,
            Self::Failed(_) => 500,
        }
    }
}

/// Handles ride requests end to end.
///
/// Every outbound call (lookup, reservation, publish) is bounded by
/// [`DispatchConfig::call_timeout`].
#[derive(Clone)]
pub struct RideDispatcher {
    config: DispatchConfig,
    directory: Arc<dyn WorkerDirectory>,
    leases: LeaseManager,
    bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
}

impl RideDispatcher {
    /// Assemble a dispatcher.
    #[must_use]
    pub fn new(
        config: DispatchConfig,
        directory: Arc<dyn WorkerDirectory>,
        leases: LeaseManager,
        bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            config,
            directory,
            leases,
            bus,
            clock,
            random,
        }
    }

    /// Handle one `POST /ride`.
    ///
    /// `auth` is the identity resolved upstream, `body` the raw request body
    /// and `reference` the request correlation id echoed in error responses.
    /// Never fails: every error becomes a [`DispatchResponse::Failed`].
    pub async fn handle_request(
        &self,
        auth: Option<&AuthContext>,
        body: &str,
        reference: &str,
    ) -> DispatchResponse {
        let started = Instant::now();
        let span = tracing::info_span!("ride_request", reference = %reference);

        let response = match self.dispatch(auth, body, reference).instrument(span.clone()).await {
            Ok(ride) => DispatchResponse::Created(ride),
            Err(error) => {
                span.in_scope(|| {
                    tracing::error!(kind = error.kind(), error = %error, "Ride request failed");
                });
                DispatchMetrics::record_error(error.kind());
                DispatchResponse::Failed(ErrorResponse {
                    error: error.to_string(),
                    reference: reference.to_string(),
                })
            },
        };

        span.in_scope(|| {
            tracing::debug!(phase = %DispatchPhase::Responded, status = response.status(), "Dispatch phase");
        });
        DispatchMetrics::record_response(response.status(), started.elapsed());
        response
    }

    async fn dispatch(
        &self,
        auth: Option<&AuthContext>,
        body: &str,
        reference: &str,
    ) -> Result<RideResponse, DispatchError> {
        tracing::debug!(phase = %DispatchPhase::Received, "Dispatch phase");
        let auth = auth.ok_or(DispatchError::AuthorizationMissing)?;
        tracing::debug!(phase = %DispatchPhase::Authorized, user = %auth.username, "Dispatch phase");

        let ride_id = RideId::generate();
        let body: RideRequestBody = serde_json::from_str(body)
            .map_err(|e| DispatchError::MalformedRequest(format!("Invalid ride request: {e}")))?;
        let request = RideRequest {
            ride_id,
            requester_id: auth.username.clone(),
            requester_email: auth.email.clone(),
            pickup_location: body.pickup_location,
        };
        tracing::info!(
            ride_id = %request.ride_id,
            latitude = request.pickup_location.latitude,
            longitude = request.pickup_location.longitude,
            "Received ride request"
        );

        let limit = self.config.call_timeout;
        let unicorn = timeout(limit, self.directory.find_unicorn(request.pickup_location))
            .await
            .map_err(|_| DirectoryError::Timeout(limit))??;
        let worker_id = unicorn.worker_id();
        tracing::debug!(phase = %DispatchPhase::WorkerSelected, worker_id = %worker_id, "Dispatch phase");

        let outcome = timeout(limit, self.leases.reserve(&worker_id, self.config.lease_duration))
            .await
            .map_err(|_| StoreError::Timeout {
                store: LEASE_STORE.to_string(),
                elapsed: limit,
            })??;
        let ride_detail = match outcome {
            LeaseOutcome::Reserved => RideDetail::reserved(unicorn),
            LeaseOutcome::Occupied => RideDetail::unassigned(),
        };
        tracing::debug!(phase = %DispatchPhase::LeaseAttempted, outcome = ?outcome, "Dispatch phase");

        let event = RideDispatchEvent {
            ride_id: request.ride_id.clone(),
            email: request.requester_email,
            user: request.requester_id.clone(),
            request_time: self.clock.now(),
            ride_detail: ride_detail.clone(),
        };
        let serialized = SerializedEvent::from_event(
            &event,
            Some(serde_json::json!({ "correlation_id": reference })),
        )
        .map_err(|e| DispatchError::Encoding(e.to_string()))?;

        let topic = &self.config.dispatch_topic;
        timeout(limit, self.bus.publish(topic, &serialized))
            .await
            .map_err(|_| EventBusError::Timeout(topic.clone()))??;
        tracing::debug!(phase = %DispatchPhase::EventPublished, topic = %topic, "Dispatch phase");

        Ok(RideResponse {
            ride_id: request.ride_id,
            ride_detail,
            eta_in_seconds: self.eta_seconds(),
            rider: request.requester_id,
        })
    }

    /// `min + floor(r × (max − min))` for a draw `r` in `[0, 1)`.
    ///
    /// A window with `max <= min` always yields `min`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn eta_seconds(&self) -> u64 {
        let min = self.config.min_ride_seconds;
        let max = self.config.max_ride_seconds;
        if max <= min {
            return min;
        }
        let span = max - min;
        let draw = self.random.unit().clamp(0.0, 1.0);
        let offset = (draw * span as f64).floor() as u64;
        min + offset.min(span - 1)
    }
}
