use crate::dlq::DeadLetterQueue;
use crate::metrics::ConsumerMetrics;
use crate::retry::{RetryPolicy, retry_with_backoff};
use futures::StreamExt;
use std::sync::Arc;
use wild_rydes_core::environment::Clock;
use wild_rydes_core::error::StoreError;
use wild_rydes_core::stores::{ChangeStream, WorkerStatStore};
use wild_rydes_core::types::{ChangeKind, RideRecordChange, WorkerStat};

/// Counts rides per worker from the ride record change stream.
///
/// Counts only grow. A change delivered twice is counted twice; totals are
/// approximate by construction.
pub struct StatsAggregator {
    store: Arc<dyn WorkerStatStore>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    dead_letters: DeadLetterQueue<RideRecordChange>,
}

impl StatsAggregator {
    /// Consumer name used for dead letters.
    pub const NAME: &'static str = "stats-aggregator";

    /// Aggregator writing to `store`, retrying failed increments under
    /// `policy`.
    #[must_use]
    pub fn new(store: Arc<dyn WorkerStatStore>, clock: Arc<dyn Clock>, policy: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
            dead_letters: DeadLetterQueue::default(),
        }
    }

    /// Changes whose increment kept failing.
    #[must_use]
    pub const fn dead_letters(&self) -> &DeadLetterQueue<RideRecordChange> {
        &self.dead_letters
    }

    /// Apply one change once.
    ///
    /// Removals and rides without a reserved worker are ignored and yield
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns the [`StoreError`] of a failed increment.
    pub async fn apply(&self, change: &RideRecordChange) -> Result<Option<WorkerStat>, StoreError> {
        if !matches!(change.kind, ChangeKind::Insert | ChangeKind::Modify) {
            return Ok(None);
        }
        let Some(worker_id) = change.record.worker_id() else {
            return Ok(None);
        };

        let stat = self.store.increment(&worker_id, 1, self.clock.now()).await?;
        ConsumerMetrics::record_stat_increment();
        tracing::debug!(
            ride_id = %change.record.ride_id,
            worker_id = %worker_id,
            rides = stat.rides,
            "Worker stat incremented"
        );
        Ok(Some(stat))
    }

    /// Apply one change, retrying under the policy and dead-lettering it
    /// once retries run out, so the stream keeps moving.
    pub async fn handle_change(&self, change: RideRecordChange) {
        let attempted = retry_with_backoff(&self.policy, || self.apply(&change)).await;
        if let Err(error) = attempted.result {
            tracing::error!(
                ride_id = %change.record.ride_id,
                error = %error,
                attempts = attempted.attempts,
                "Worker stat increment failed"
            );
            self.dead_letters
                .push(change, Self::NAME, error.to_string(), attempted.attempts);
        }
    }

    /// Consume `changes` one record at a time until the stream ends.
    pub async fn run(&self, mut changes: ChangeStream) {
        tracing::info!("Stats aggregator started");
        while let Some(change) = changes.next().await {
            self.handle_change(change).await;
        }
        tracing::info!("Change stream closed, stats aggregator stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::InMemoryWorkerStatStore;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use wild_rydes_core::stores::{RideRecordStore, StoreFuture};
    use wild_rydes_core::types::{RideId, RideRecord, Unicorn, WorkerId};
    use wild_rydes_testing::test_clock;

    fn change(kind: ChangeKind, ride_id: &str, worker: Option<&str>) -> RideRecordChange {
        RideRecordChange {
            kind,
            record: RideRecord {
                ride_id: RideId::new(ride_id),
                user: "rider".to_string(),
                email: None,
                unicorn: worker.map(Unicorn::named),
                request_time: test_clock().now(),
            },
        }
    }

    fn aggregator(store: Arc<dyn WorkerStatStore>) -> StatsAggregator {
        let policy = RetryPolicy::builder()
            .max_retries(2)
            .initial_delay(Duration::from_millis(1))
            .build();
        StatsAggregator::new(store, Arc::new(test_clock()), policy)
    }

    #[tokio::test]
    async fn ignores_removals_and_unassigned_rides() {
        let store = Arc::new(InMemoryWorkerStatStore::new());
        let stats = aggregator(store.clone());

        assert!(stats.apply(&change(ChangeKind::Remove, "r1", Some("Sparkle"))).await.unwrap().is_none());
        assert!(stats.apply(&change(ChangeKind::Insert, "r2", None)).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn counts_inserts_and_modifies() {
        let store = Arc::new(InMemoryWorkerStatStore::new());
        let stats = aggregator(store.clone());

        stats.handle_change(change(ChangeKind::Insert, "r1", Some("Sparkle"))).await;
        stats.handle_change(change(ChangeKind::Modify, "r2", Some("Sparkle"))).await;

        let row = store.get(&WorkerId::new("Sparkle")).await.unwrap().unwrap();
        assert_eq!(row.rides, 2);
    }

    /// Fails the first `failures` increments, then delegates.
    struct FlakyStatStore {
        inner: InMemoryWorkerStatStore,
        failures: usize,
        calls: AtomicUsize,
    }

    impl WorkerStatStore for FlakyStatStore {
        fn increment<'a>(
            &'a self,
            worker_id: &'a WorkerId,
            by: u64,
            at: DateTime<Utc>,
        ) -> StoreFuture<'a, WorkerStat> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Box::pin(async {
                    Err(StoreError::Unavailable {
                        store: "UnicornStats".to_string(),
                        reason: "throttled".to_string(),
                    })
                });
            }
            self.inner.increment(worker_id, by, at)
        }

        fn get<'a>(&'a self, worker_id: &'a WorkerId) -> StoreFuture<'a, Option<WorkerStat>> {
            self.inner.get(worker_id)
        }

        fn list(&self) -> StoreFuture<'_, Vec<WorkerStat>> {
            self.inner.list()
        }
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let store = Arc::new(FlakyStatStore {
            inner: InMemoryWorkerStatStore::new(),
            failures: 2,
            calls: AtomicUsize::new(0),
        });
        let stats = aggregator(store.clone());

        stats.handle_change(change(ChangeKind::Insert, "r1", Some("Sparkle"))).await;

        assert_eq!(store.get(&WorkerId::new("Sparkle")).await.unwrap().unwrap().rides, 1);
        assert!(stats.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_dead_letter_and_stream_continues() {
        let store = Arc::new(FlakyStatStore {
            inner: InMemoryWorkerStatStore::new(),
            failures: 3,
            calls: AtomicUsize::new(0),
        });
        let stats = aggregator(store.clone());
        let changes: ChangeStream = Box::pin(futures::stream::iter(vec![
            change(ChangeKind::Insert, "r1", Some("Sparkle")),
            change(ChangeKind::Insert, "r2", Some("Sparkle")),
        ]));

        stats.run(changes).await;

        let dead = stats.dead_letters().entries();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].payload.record.ride_id, RideId::new("r1"));
        assert_eq!(dead[0].attempts, 3);
        assert_eq!(store.get(&WorkerId::new("Sparkle")).await.unwrap().unwrap().rides, 1);
    }

    #[tokio::test]
    async fn burst_of_rides_is_counted_in_full() {
        let rides = crate::memory::InMemoryRideRecordStore::new("Rides");
        let changes = rides.changes();
        for n in 0..1500 {
            let record = change(ChangeKind::Insert, &format!("r{n}"), Some("Sparkle")).record;
            assert!(rides.put_if_absent(record).await.unwrap());
        }
        // Closing the table ends the stream once the backlog is drained.
        drop(rides);

        let store = Arc::new(InMemoryWorkerStatStore::new());
        aggregator(store.clone()).run(changes).await;

        assert_eq!(store.get(&WorkerId::new("Sparkle")).await.unwrap().unwrap().rides, 1500);
    }

    proptest! {
        #[test]
        fn count_covers_every_distinct_ride(deliveries in proptest::collection::vec((0u8..20, 0u8..3), 1..60)) {
            tokio_test::block_on(async {
                let store = Arc::new(InMemoryWorkerStatStore::new());
                let stats = aggregator(store.clone());
                let workers = ["Sparkle", "Shadowfax", "Bucephalus"];
                let mut distinct: Vec<HashSet<u8>> = vec![HashSet::new(); workers.len()];
                let mut previous = [0u64; 3];

                for (ride, worker) in deliveries {
                    let w = usize::from(worker);
                    distinct[w].insert(ride);
                    stats
                        .handle_change(change(ChangeKind::Insert, &format!("{w}-{ride}"), Some(workers[w])))
                        .await;

                    let now = store.get(&WorkerId::new(workers[w])).await.unwrap().unwrap().rides;
                    assert!(now > previous[w]);
                    previous[w] = now;
                }

                for (w, name) in workers.iter().enumerate() {
                    let counted = store
                        .get(&WorkerId::new(*name))
                        .await
                        .unwrap()
                        .map_or(0, |stat| stat.rides);
                    assert!(counted >= distinct[w].len() as u64);
                }
            });
        }
    }
}
