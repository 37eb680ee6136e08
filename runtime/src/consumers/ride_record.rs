use super::decode_dispatch;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use wild_rydes_core::event::SerializedEvent;
use wild_rydes_core::event_bus::{EventHandler, HandlerError, HandlerFuture};
use wild_rydes_core::stores::RideRecordStore;
use wild_rydes_core::types::RideRecord;

/// Persists one ride record per dispatch event.
///
/// The ride id is the idempotency key: a redelivered event finds its row
/// already written and is acknowledged without touching the store.
pub struct RideRecordWriter {
    store: Arc<dyn RideRecordStore>,
    call_timeout: Duration,
}

impl RideRecordWriter {
    /// Subscriber name.
    pub const NAME: &'static str = "ride-record-writer";

    /// Writer over `store`, bounding each write by `call_timeout`.
    #[must_use]
    pub fn new(store: Arc<dyn RideRecordStore>, call_timeout: Duration) -> Self {
        Self {
            store,
            call_timeout,
        }
    }

    /// Process one delivery.
    ///
    /// # Errors
    ///
    /// [`HandlerError::Rejected`] when the event does not decode,
    /// [`HandlerError::Retryable`] when the write fails or times out.
    pub async fn process(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
        let record = RideRecord::from(decode_dispatch(event)?);
        let ride_id = record.ride_id.clone();

        let inserted = timeout(self.call_timeout, self.store.put_if_absent(record))
            .await
            .map_err(|_| {
                HandlerError::Retryable(format!("ride write timed out after {:?}", self.call_timeout))
            })?
            .map_err(|e| HandlerError::Retryable(e.to_string()))?;

        if inserted {
            tracing::info!(ride_id = %ride_id, "Ride recorded");
        } else {
            tracing::debug!(ride_id = %ride_id, "Ride already recorded, duplicate delivery");
        }
        Ok(())
    }
}

impl EventHandler for RideRecordWriter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle<'a>(&'a self, event: &'a SerializedEvent) -> HandlerFuture<'a> {
        Box::pin(self.process(event))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRideRecordStore;
    use wild_rydes_core::environment::Clock;
    use wild_rydes_core::types::{RideDetail, RideDispatchEvent, RideId, Unicorn};
    use wild_rydes_testing::test_clock;

    fn dispatched(detail: RideDetail) -> SerializedEvent {
        let event = RideDispatchEvent {
            ride_id: RideId::new("ride-1"),
            email: None,
            user: "rider".to_string(),
            request_time: test_clock().now(),
            ride_detail: detail,
        };
        SerializedEvent::from_event(&event, None).unwrap()
    }

    #[tokio::test]
    async fn duplicate_delivery_keeps_single_row() {
        let store = Arc::new(InMemoryRideRecordStore::new("Rides"));
        let writer = RideRecordWriter::new(store.clone(), Duration::from_secs(1));
        let event = dispatched(RideDetail::reserved(Unicorn::named("Sparkle")));

        writer.process(&event).await.unwrap();
        writer.process(&event).await.unwrap();

        assert_eq!(store.len(), 1);
        let row = store.get(&RideId::new("ride-1")).await.unwrap().unwrap();
        assert_eq!(row.worker_id().unwrap().as_str(), "Sparkle");
    }

    #[tokio::test]
    async fn unassigned_ride_is_recorded_without_worker() {
        let store = Arc::new(InMemoryRideRecordStore::new("Rides"));
        let writer = RideRecordWriter::new(store.clone(), Duration::from_secs(1));

        writer.process(&dispatched(RideDetail::unassigned())).await.unwrap();

        let row = store.get(&RideId::new("ride-1")).await.unwrap().unwrap();
        assert!(row.unicorn.is_none());
    }
}
