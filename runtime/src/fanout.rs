//! In-process fan-out event bus.
//!
//! Every subscriber of a topic receives its own copy of each published
//! event. Deliveries are independent: each runs under the redelivery policy
//! on its own, and a subscriber that keeps failing ends up in the dead
//! letter queue without holding up its siblings.
//!
//! Two entry points:
//!
//! - [`EventBus::publish`] hands each delivery to a background task and
//!   returns once they are scheduled
//! - [`FanoutEventBus::deliver`] awaits every subscriber and reports how
//!   each delivery ended
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wild_rydes_runtime::fanout::FanoutEventBus;
//! use wild_rydes_runtime::retry::RetryPolicy;
//! # use wild_rydes_core::event_bus::EventHandler;
//! # fn handlers() -> (Arc<dyn EventHandler>, Arc<dyn EventHandler>) { unimplemented!() }
//!
//! let (receipts, rides) = handlers();
//! let bus = FanoutEventBus::new(RetryPolicy::default());
//! bus.subscribe("unicorn-dispatched", receipts);
//! bus.subscribe("unicorn-dispatched", rides);
//! ```

use crate::dlq::DeadLetterQueue;
use crate::metrics::EventBusMetrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::Instrument;
use wild_rydes_core::event::SerializedEvent;
use wild_rydes_core::event_bus::{EventBus, EventBusError, EventHandler, HandlerError};

/// How one subscriber's delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The subscriber processed the event.
    Acknowledged,
    /// Redelivery was exhausted or the event was rejected.
    DeadLettered(HandlerError),
}

/// Per-subscriber result of [`FanoutEventBus::deliver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscriber name
    pub subscriber: String,
    /// Deliveries made, including the first
    pub attempts: usize,
    /// Final outcome
    pub outcome: DeliveryOutcome,
}

impl DeliveryReport {
    /// Whether the subscriber processed the event.
    #[must_use]
    pub const fn is_acknowledged(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Acknowledged)
    }
}

/// Topic-based fan-out bus with redelivery and dead-lettering.
pub struct FanoutEventBus {
    subscriptions: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    policy: RetryPolicy,
    dead_letters: DeadLetterQueue<SerializedEvent>,
}

impl FanoutEventBus {
    /// Bus redelivering under `policy`, with a default-sized dead letter
    /// queue.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_dead_letters(policy, DeadLetterQueue::default())
    }

    /// Bus sharing an existing dead letter queue.
    #[must_use]
    pub fn with_dead_letters(
        policy: RetryPolicy,
        dead_letters: DeadLetterQueue<SerializedEvent>,
    ) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            policy,
            dead_letters,
        }
    }

    /// Add a subscriber to `topic`.
    pub fn subscribe(&self, topic: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let topic = topic.into();
        tracing::info!(topic = %topic, subscriber = handler.name(), "Subscriber registered");
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic)
            .or_default()
            .push(handler);
    }

    /// Events that could not be delivered.
    #[must_use]
    pub const fn dead_letters(&self) -> &DeadLetterQueue<SerializedEvent> {
        &self.dead_letters
    }

    /// Deliver `event` to every subscriber of `topic` and wait for all of
    /// them.
    ///
    /// Subscribers run concurrently. The returned reports follow
    /// subscription order.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::InvalidTopic`] for an empty topic name.
    pub async fn deliver(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Result<Vec<DeliveryReport>, EventBusError> {
        let subscribers = self.subscribers(topic)?;
        let deliveries = subscribers.into_iter().map(|handler| {
            deliver_to(handler, event.clone(), self.policy.clone(), self.dead_letters.clone())
        });
        Ok(join_all(deliveries).await)
    }

    fn subscribers(&self, topic: &str) -> Result<Vec<Arc<dyn EventHandler>>, EventBusError> {
        if topic.is_empty() {
            return Err(EventBusError::InvalidTopic(topic.to_string()));
        }
        let subscribers = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned()
            .unwrap_or_default();
        if subscribers.is_empty() {
            tracing::debug!(topic, "No subscribers for topic");
        }
        Ok(subscribers)
    }
}

impl EventBus for FanoutEventBus {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        event: &'a SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + 'a>> {
        Box::pin(async move {
            let subscribers = self.subscribers(topic)?;
            for handler in subscribers {
                tokio::spawn(deliver_to(
                    handler,
                    event.clone(),
                    self.policy.clone(),
                    self.dead_letters.clone(),
                ));
            }
            EventBusMetrics::record_publish();
            tracing::debug!(topic, event_type = %event.event_type, "Event accepted for fan-out");
            Ok(())
        })
    }
}

async fn deliver_to(
    handler: Arc<dyn EventHandler>,
    event: SerializedEvent,
    policy: RetryPolicy,
    dead_letters: DeadLetterQueue<SerializedEvent>,
) -> DeliveryReport {
    let subscriber = handler.name().to_string();
    let span = tracing::info_span!(
        "delivery",
        subscriber = %subscriber,
        event_type = %event.event_type,
    );

    async move {
        let attempted =
            retry_with_predicate(&policy, || handler.handle(&event), HandlerError::is_retryable)
                .await;

        let outcome = match attempted.result {
            Ok(()) => {
                tracing::debug!(attempts = attempted.attempts, "Delivery acknowledged");
                DeliveryOutcome::Acknowledged
            },
            Err(error) => {
                dead_letters.push(event, &subscriber, error.to_string(), attempted.attempts);
                DeliveryOutcome::DeadLettered(error)
            },
        };
        EventBusMetrics::record_delivery(
            &subscriber,
            matches!(outcome, DeliveryOutcome::Acknowledged),
            attempted.attempts,
        );

        DeliveryReport {
            subscriber,
            attempts: attempted.attempts,
            outcome,
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use wild_rydes_core::event_bus::HandlerFuture;

    /// Fails with `error` for the first `failures` deliveries.
    struct FlakyHandler {
        name: &'static str,
        failures: usize,
        error: HandlerError,
        calls: AtomicUsize,
    }

    impl FlakyHandler {
        fn new(name: &'static str, failures: usize, error: HandlerError) -> Arc<Self> {
            Arc::new(Self {
                name,
                failures,
                error,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl EventHandler for FlakyHandler {
        fn name(&self) -> &str {
            self.name
        }

        fn handle<'a>(&'a self, _event: &'a SerializedEvent) -> HandlerFuture<'a> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok(())
            };
            Box::pin(async move { result })
        }
    }

    struct ForwardingHandler(mpsc::UnboundedSender<SerializedEvent>);

    impl EventHandler for ForwardingHandler {
        fn name(&self) -> &str {
            "forwarder"
        }

        fn handle<'a>(&'a self, event: &'a SerializedEvent) -> HandlerFuture<'a> {
            let _ = self.0.send(event.clone());
            Box::pin(async { Ok(()) })
        }
    }

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
            .build()
    }

    fn event() -> SerializedEvent {
        SerializedEvent::new("UnicornDispatched.v1".to_string(), b"{}".to_vec(), None)
    }

    #[tokio::test]
    async fn failing_subscriber_does_not_affect_sibling() {
        let bus = FanoutEventBus::new(fast_policy(2));
        let broken = FlakyHandler::new("receipts", usize::MAX, HandlerError::Retryable("BORKED".into()));
        let healthy = FlakyHandler::new("rides", 0, HandlerError::Retryable(String::new()));
        bus.subscribe("unicorn-dispatched", broken.clone());
        bus.subscribe("unicorn-dispatched", healthy.clone());

        let reports = bus.deliver("unicorn-dispatched", &event()).await.unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].subscriber, "receipts");
        assert_eq!(reports[0].attempts, 3);
        assert!(!reports[0].is_acknowledged());
        assert!(reports[1].is_acknowledged());
        assert_eq!(healthy.calls(), 1);

        let dead = bus.dead_letters().entries();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].consumer, "receipts");
        assert_eq!(dead[0].attempts, 3);
    }

    #[tokio::test]
    async fn retryable_failure_is_redelivered_until_acknowledged() {
        let bus = FanoutEventBus::new(fast_policy(3));
        let handler = FlakyHandler::new("receipts", 2, HandlerError::Retryable("BORKED".into()));
        bus.subscribe("unicorn-dispatched", handler.clone());

        let reports = bus.deliver("unicorn-dispatched", &event()).await.unwrap();

        assert!(reports[0].is_acknowledged());
        assert_eq!(reports[0].attempts, 3);
        assert!(bus.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn rejected_event_is_dead_lettered_without_redelivery() {
        let bus = FanoutEventBus::new(fast_policy(3));
        let handler = FlakyHandler::new("rides", 1, HandlerError::Rejected("bad payload".into()));
        bus.subscribe("unicorn-dispatched", handler.clone());

        let reports = bus.deliver("unicorn-dispatched", &event()).await.unwrap();

        assert_eq!(
            reports[0].outcome,
            DeliveryOutcome::DeadLettered(HandlerError::Rejected("bad payload".into()))
        );
        assert_eq!(handler.calls(), 1);
        assert_eq!(bus.dead_letters().len(), 1);
    }

    #[tokio::test]
    async fn publish_delivers_in_background() {
        let bus = FanoutEventBus::new(fast_policy(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe("unicorn-dispatched", Arc::new(ForwardingHandler(tx)));

        bus.publish("unicorn-dispatched", &event()).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, event());
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = FanoutEventBus::new(fast_policy(0));
        let handler = FlakyHandler::new("rides", 0, HandlerError::Retryable(String::new()));
        bus.subscribe("unicorn-dispatched", handler.clone());

        let reports = bus.deliver("ride-cancelled", &event()).await.unwrap();

        assert!(reports.is_empty());
        assert_eq!(handler.calls(), 0);
    }

    #[tokio::test]
    async fn empty_topic_is_invalid() {
        let bus = FanoutEventBus::new(RetryPolicy::no_retries());

        let result = bus.publish("", &event()).await;

        assert_eq!(result, Err(EventBusError::InvalidTopic(String::new())));
    }
}
