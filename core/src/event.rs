//! Event trait and wire format.
//!
//! Events are facts about things that have already happened. They travel
//! through the bus as a [`SerializedEvent`]: a stable type name plus the JSON
//! bytes of the payload. JSON is used so that the payload can be handed to
//! external consumers (the receipt post-processor stores and forwards it
//! verbatim).
//!
//! # Example
//!
//! ```
//! use wild_rydes_core::event::Event;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! struct RideCancelled {
//!     ride_id: String,
//! }
//!
//! impl Event for RideCancelled {
//!     fn event_type(&self) -> &'static str {
//!         "RideCancelled.v1"
//!     }
//! }
//! ```

use crate::types::RideDispatchEvent;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),

    /// Unexpected event type for the requested payload.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
}

/// An event that can be published on the bus.
///
/// The `event_type()` string is the routing and versioning key; it carries a
/// version suffix (`"UnicornDispatched.v1"`).
pub trait Event: Send + Sync + 'static {
    /// Returns the event type identifier for this event.
    fn event_type(&self) -> &'static str;

    /// Serialize this event to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        serde_json::to_vec(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` if the bytes do not hold
    /// this event type.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        serde_json::from_slice(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

/// Event type of [`RideDispatchEvent`].
pub const UNICORN_DISPATCHED: &str = "UnicornDispatched.v1";

impl Event for RideDispatchEvent {
    fn event_type(&self) -> &'static str {
        UNICORN_DISPATCHED
    }
}

/// A serialized event ready for publication.
#[derive(Clone, Debug, PartialEq)]
pub struct SerializedEvent {
    /// The event type identifier (e.g., "UnicornDispatched.v1").
    pub event_type: String,

    /// The JSON-serialized event data.
    pub data: Vec<u8>,

    /// Optional metadata.
    ///
    /// Common metadata fields:
    /// - `correlation_id`: the HTTP request reference that produced the event
    pub metadata: Option<serde_json::Value>,
}

impl SerializedEvent {
    /// Create a new serialized event.
    #[must_use]
    pub const fn new(
        event_type: String,
        data: Vec<u8>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            data,
            metadata,
        }
    }

    /// Create a serialized event from an `Event`.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    pub fn from_event<E: Event + Serialize>(
        event: &E,
        metadata: Option<serde_json::Value>,
    ) -> Result<Self, EventError> {
        Ok(Self {
            event_type: event.event_type().to_string(),
            data: event.to_bytes()?,
            metadata,
        })
    }

    /// Decode the payload as `E`, checking the type name first.
    ///
    /// # Errors
    ///
    /// Returns `EventError::UnknownEventType` when the type name differs from
    /// `expected_type`, or `EventError::DeserializationError` when the bytes
    /// do not decode.
    pub fn decode<E: Event + DeserializeOwned>(&self, expected_type: &str) -> Result<E, EventError> {
        if self.event_type != expected_type {
            return Err(EventError::UnknownEventType(self.event_type.clone()));
        }
        E::from_bytes(&self.data)
    }
}

impl fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedEvent {{ type: {}, size: {} bytes }}",
            self.event_type,
            self.data.len()
        )
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::{RideDetail, RideId, Unicorn};
    use chrono::Utc;

    fn dispatch_event() -> RideDispatchEvent {
        RideDispatchEvent {
            ride_id: RideId::new("ride-1"),
            email: Some("rider@example.com".to_string()),
            user: "rider".to_string(),
            request_time: Utc::now(),
            ride_detail: RideDetail::reserved(Unicorn::named("Sparkle")),
        }
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn serialized_event_decodes_back() {
        let event = dispatch_event();
        let serialized =
            SerializedEvent::from_event(&event, None).expect("serialization should succeed");

        assert_eq!(serialized.event_type, UNICORN_DISPATCHED);
        let decoded: RideDispatchEvent = serialized
            .decode(UNICORN_DISPATCHED)
            .expect("decode should succeed");
        assert_eq!(decoded, event);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn payload_uses_public_field_names() {
        let serialized =
            SerializedEvent::from_event(&dispatch_event(), None).expect("serialization should succeed");
        let value: serde_json::Value =
            serde_json::from_slice(&serialized.data).expect("payload is JSON");

        assert_eq!(value["RideId"], "ride-1");
        assert_eq!(value["User"], "rider");
        assert_eq!(value["RideDetail"]["Unicorn"]["Name"], "Sparkle");
        assert!(value["RequestTime"].is_string());
    }

    #[test]
    fn decode_rejects_other_event_types() {
        let serialized = SerializedEvent::new("RideCancelled.v1".to_string(), b"{}".to_vec(), None);
        let result: Result<RideDispatchEvent, _> = serialized.decode(UNICORN_DISPATCHED);
        assert!(matches!(result, Err(EventError::UnknownEventType(_))));
    }

    #[test]
    fn serialized_event_display() {
        let serialized = SerializedEvent::new("TestEvent.v1".to_string(), vec![1, 2, 3, 4, 5], None);

        let display = format!("{serialized}");
        assert!(display.contains("TestEvent.v1"));
        assert!(display.contains("5 bytes"));
    }
}
