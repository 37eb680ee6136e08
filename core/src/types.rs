//! Wire and storage types.
//!
//! JSON field names follow the public ride API (`RideId`, `RideDetail`,
//! `EtaInSeconds`, ...), so every wire type renames its fields to
//! `PascalCase`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of random bytes behind a ride id.
pub const RIDE_ID_BYTES: usize = 16;

/// Opaque, URL-safe ride identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RideId(String);

impl RideId {
    /// Generate a fresh ride id: 16 random bytes, base64url without padding.
    ///
    /// No uniqueness re-check is made against any store.
    #[must_use]
    pub fn generate() -> Self {
        let mut random_bytes = [0u8; RIDE_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut random_bytes);
        Self(URL_SAFE_NO_PAD.encode(random_bytes))
    }

    /// Wrap an existing id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Worker ("unicorn") identity. The unicorn's name is its key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Wrap a worker name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Geographic point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Location {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

/// Worker record returned by the worker directory.
///
/// Only `Name` is interpreted; every other attribute is carried through to
/// the client and the dispatch event untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unicorn {
    /// Unicorn name, the lease key
    #[serde(rename = "Name")]
    pub name: String,
    /// Remaining directory attributes
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Unicorn {
    /// Unicorn with a name and no extra attributes.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: serde_json::Map::new(),
        }
    }

    /// Lease key for this unicorn.
    #[must_use]
    pub fn worker_id(&self) -> WorkerId {
        WorkerId::new(self.name.clone())
    }
}

/// Reservation outcome carried by responses and events.
///
/// Serializes as `{"Unicorn": {...}}` when a worker was reserved and as the
/// empty object `{}` when the reservation failed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RideDetail {
    /// Reserved unicorn, absent when the worker was occupied
    #[serde(rename = "Unicorn", default, skip_serializing_if = "Option::is_none")]
    pub unicorn: Option<Unicorn>,
}

impl RideDetail {
    /// Detail for a successful reservation.
    #[must_use]
    pub const fn reserved(unicorn: Unicorn) -> Self {
        Self {
            unicorn: Some(unicorn),
        }
    }

    /// The `{}` sentinel.
    #[must_use]
    pub const fn unassigned() -> Self {
        Self { unicorn: None }
    }

    /// Whether a worker was reserved.
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.unicorn.is_some()
    }
}

/// Identity resolved by the upstream authorizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthContext {
    /// Requester user name
    pub username: String,
    /// Requester email claim, if present
    pub email: Option<String>,
}

/// Body of `POST /ride`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RideRequestBody {
    /// Where the rider wants to be picked up
    pub pickup_location: Location,
}

/// In-flight ride request. Never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct RideRequest {
    /// Generated ride id
    pub ride_id: RideId,
    /// Requester user name
    pub requester_id: String,
    /// Requester email
    pub requester_email: Option<String>,
    /// Pickup point
    pub pickup_location: Location,
}

/// Event published once a ride request has been processed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RideDispatchEvent {
    /// Ride id, the idempotency key of every consumer
    pub ride_id: RideId,
    /// Requester email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Requester user name
    pub user: String,
    /// When the request was handled
    pub request_time: DateTime<Utc>,
    /// Reservation outcome
    pub ride_detail: RideDetail,
}

/// Client-facing `201` body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RideResponse {
    /// Ride id
    pub ride_id: RideId,
    /// Reservation outcome
    pub ride_detail: RideDetail,
    /// Estimated time of arrival
    pub eta_in_seconds: u64,
    /// Requester user name
    pub rider: String,
}

/// Client-facing `500` body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Request correlation id
    pub reference: String,
}

/// Time-bounded reservation of a worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerLease {
    /// Leased worker
    pub worker_id: WorkerId,
    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
}

impl WorkerLease {
    /// Whether the lease still holds the worker at `now`.
    ///
    /// A lease expiring exactly at `now` no longer holds.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Result of a reservation attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaseOutcome {
    /// Lease written, the worker is ours until it expires
    Reserved,
    /// An unexpired lease exists, nothing was written
    Occupied,
}

/// Persisted ride, one row per ride id, immutable once written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RideRecord {
    /// Ride id (primary key)
    pub ride_id: RideId,
    /// Requester user name
    pub user: String,
    /// Requester email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Reserved unicorn, absent when the reservation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicorn: Option<Unicorn>,
    /// When the ride was requested
    pub request_time: DateTime<Utc>,
}

impl RideRecord {
    /// Worker credited with this ride, if any.
    #[must_use]
    pub fn worker_id(&self) -> Option<WorkerId> {
        self.unicorn.as_ref().map(Unicorn::worker_id)
    }
}

impl From<RideDispatchEvent> for RideRecord {
    fn from(event: RideDispatchEvent) -> Self {
        Self {
            ride_id: event.ride_id,
            user: event.user,
            email: event.email,
            unicorn: event.ride_detail.unicorn,
            request_time: event.request_time,
        }
    }
}

/// Kind of change observed on the ride record store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// New row
    Insert,
    /// Existing row replaced
    Modify,
    /// Row removed
    Remove,
}

/// One entry of the ride record change stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RideRecordChange {
    /// What happened to the row
    pub kind: ChangeKind,
    /// Row image after the change (before it, for removals)
    pub record: RideRecord,
}

/// Running per-worker statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStat {
    /// Worker (primary key)
    pub worker_id: WorkerId,
    /// Rides counted so far; may over-count under redelivery
    pub rides: u64,
    /// Last increment
    pub updated_at: DateTime<Utc>,
}

/// Raw receipt payload keyed by ride id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptArtifact {
    /// Ride id
    pub ride_id: RideId,
    /// Opaque payload (the dispatch event as received)
    pub payload: Vec<u8>,
}

impl ReceiptArtifact {
    /// Artifact store key.
    #[must_use]
    pub fn key(&self) -> String {
        format!("receipts/{}.json", self.ride_id)
    }
}

/// One worker's line on a salary report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SalaryLine {
    /// Worker name
    pub name: WorkerId,
    /// Rides counted
    pub rides: u64,
    /// `rides × rate`
    pub amount_cents: u64,
}

/// Snapshot of salaries derived from worker statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SalaryReport {
    /// When the snapshot was taken
    pub generated_at: DateTime<Utc>,
    /// Rate applied per ride
    pub rate_cents: u64,
    /// One line per worker, sorted by name
    pub lines: Vec<SalaryLine>,
}

impl SalaryReport {
    /// Artifact store key.
    #[must_use]
    pub fn key(&self) -> String {
        format!("salaries/{}.json", self.generated_at.to_rfc3339())
    }
}
