//! Event bus abstraction for dispatch fan-out.
//!
//! One published event is delivered to every handler subscribed to the
//! topic, independently of the others.
//!
//! ```text
//!               ┌──────────────────┐
//!               │  Ride dispatcher │
//!               └────────┬─────────┘
//!                        │ publish("unicorn-dispatched")
//!                        ▼
//!               ┌──────────────────┐
//!               │    Event Bus     │◄─── At-least-once, per subscriber
//!               └────────┬─────────┘
//!                   ┌────┴─────┐
//!                   ▼          ▼
//!            ┌──────────┐ ┌──────────┐
//!            │ Receipts │ │  Rides   │
//!            └──────────┘ └──────────┘
//! ```
//!
//! # Key Principles
//!
//! - **At-least-once delivery**: a handler may see the same event again
//! - **Isolation**: a failing handler never blocks delivery to its siblings
//! - **No ordering** between subscribers
//! - **Idempotency**: handlers key their writes on the ride id
//!
//! Redelivery policy belongs to the bus implementation; a handler only
//! reports whether it processed the event.

use crate::event::SerializedEvent;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// Failed to publish an event to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Topic not found or invalid
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    /// Publishing did not complete within the configured timeout
    #[error("Publish to topic '{0}' timed out")]
    Timeout(String),
}

/// Outcome reported by a handler that did not process an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Transient failure; the event must be redelivered.
    #[error("{0}")]
    Retryable(String),

    /// The event can never be processed (e.g. it does not decode).
    #[error("rejected: {0}")]
    Rejected(String),
}

impl HandlerError {
    /// Whether redelivering the same event could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Future returned by [`EventHandler::handle`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;

/// A subscriber to a topic.
///
/// Returning `Ok(())` acknowledges the event. Returning an error leaves it
/// unacknowledged: retryable errors are redelivered, rejections are
/// dead-lettered.
pub trait EventHandler: Send + Sync {
    /// Stable subscriber name, used in logs and dead letters.
    fn name(&self) -> &str;

    /// Process one delivery.
    fn handle<'a>(&'a self, event: &'a SerializedEvent) -> HandlerFuture<'a>;
}

/// Trait for event bus implementations.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so that components can hold an `Arc<dyn EventBus>`.
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic.
    ///
    /// Returns once the bus has accepted the event for delivery; it does not
    /// wait for subscribers to process it.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the bus refuses the event.
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        event: &'a SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + 'a>>;
}
