//! In-process store backends.
//!
//! These back the single-process deployment and the test suite. Each store
//! guards its rows with its own lock, never held across an await.

use async_stream::stream;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use wild_rydes_core::environment::Clock;
use wild_rydes_core::stores::{
    ArtifactStore, ChangeStream, LeaseStore, RideRecordStore, StoreFuture, WorkerStatStore,
};
use wild_rydes_core::types::{
    ChangeKind, RideId, RideRecord, RideRecordChange, WorkerId, WorkerLease, WorkerStat,
};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lease table honoring the `expires_at` TTL.
///
/// Expired rows are dropped when read, the way a TTL sweep would remove
/// them.
pub struct InMemoryLeaseStore {
    name: String,
    clock: Arc<dyn Clock>,
    rows: Mutex<HashMap<WorkerId, WorkerLease>>,
}

impl InMemoryLeaseStore {
    /// Empty table named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            clock,
            rows: Mutex::new(HashMap::new()),
        }
    }

    /// Number of rows, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    /// Whether the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LeaseStore for InMemoryLeaseStore {
    fn get<'a>(&'a self, worker_id: &'a WorkerId) -> StoreFuture<'a, Option<WorkerLease>> {
        Box::pin(async move {
            let now = self.clock.now();
            let mut rows = lock(&self.rows);
            match rows.get(worker_id) {
                Some(lease) if !lease.is_active_at(now) => {
                    tracing::trace!(table = %self.name, worker_id = %worker_id, "Expired lease swept");
                    rows.remove(worker_id);
                    Ok(None)
                },
                row => Ok(row.cloned()),
            }
        })
    }

    fn put(&self, lease: WorkerLease) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            lock(&self.rows).insert(lease.worker_id.clone(), lease);
            Ok(())
        })
    }

    fn put_if_vacant(&self, lease: WorkerLease, now: DateTime<Utc>) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut rows = lock(&self.rows);
            if rows
                .get(&lease.worker_id)
                .is_some_and(|existing| existing.is_active_at(now))
            {
                return Ok(false);
            }
            rows.insert(lease.worker_id.clone(), lease);
            Ok(true)
        })
    }
}

/// Ride table with a change stream of committed inserts.
///
/// Every subscriber gets its own unbounded queue, so a slow consumer sees
/// every change committed after it subscribed, in commit order.
pub struct InMemoryRideRecordStore {
    name: String,
    rows: Mutex<HashMap<RideId, RideRecord>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<RideRecordChange>>>,
}

impl InMemoryRideRecordStore {
    /// Empty table named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    /// Whether the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RideRecordStore for InMemoryRideRecordStore {
    fn put_if_absent(&self, record: RideRecord) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut rows = lock(&self.rows);
            if rows.contains_key(&record.ride_id) {
                return Ok(false);
            }
            rows.insert(record.ride_id.clone(), record.clone());

            // Published under the row lock so streams follow commit order.
            let change = RideRecordChange {
                kind: ChangeKind::Insert,
                record,
            };
            lock(&self.subscribers).retain(|tx| tx.send(change.clone()).is_ok());
            Ok(true)
        })
    }

    fn get<'a>(&'a self, ride_id: &'a RideId) -> StoreFuture<'a, Option<RideRecord>> {
        Box::pin(async move { Ok(lock(&self.rows).get(ride_id).cloned()) })
    }

    fn changes(&self) -> ChangeStream {
        let (tx, mut receiver) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        let table = self.name.clone();
        Box::pin(stream! {
            while let Some(change) = receiver.recv().await {
                yield change;
            }
            tracing::debug!(table = %table, "Change stream closed");
        })
    }
}

/// Worker statistics table.
pub struct InMemoryWorkerStatStore {
    rows: Mutex<HashMap<WorkerId, WorkerStat>>,
}

impl InMemoryWorkerStatStore {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryWorkerStatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerStatStore for InMemoryWorkerStatStore {
    fn increment<'a>(
        &'a self,
        worker_id: &'a WorkerId,
        by: u64,
        at: DateTime<Utc>,
    ) -> StoreFuture<'a, WorkerStat> {
        Box::pin(async move {
            let mut rows = lock(&self.rows);
            let row = rows.entry(worker_id.clone()).or_insert_with(|| WorkerStat {
                worker_id: worker_id.clone(),
                rides: 0,
                updated_at: at,
            });
            row.rides = row.rides.saturating_add(by);
            row.updated_at = at;
            Ok(row.clone())
        })
    }

    fn get<'a>(&'a self, worker_id: &'a WorkerId) -> StoreFuture<'a, Option<WorkerStat>> {
        Box::pin(async move { Ok(lock(&self.rows).get(worker_id).cloned()) })
    }

    fn list(&self) -> StoreFuture<'_, Vec<WorkerStat>> {
        Box::pin(async move { Ok(lock(&self.rows).values().cloned().collect()) })
    }
}

/// Object bucket.
pub struct InMemoryArtifactStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    /// Empty bucket.
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Keys currently stored, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.objects).keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for InMemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn put(&self, key: String, bytes: Vec<u8>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            lock(&self.objects).insert(key, bytes);
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move { Ok(lock(&self.objects).get(key).cloned()) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;
    use wild_rydes_testing::{ManualClock, test_clock};

    fn lease(clock: &ManualClock, worker: &str, seconds: i64) -> WorkerLease {
        WorkerLease {
            worker_id: WorkerId::new(worker),
            expires_at: clock.now() + chrono::Duration::seconds(seconds),
        }
    }

    #[tokio::test]
    async fn expired_lease_is_swept_on_read() {
        let clock = ManualClock::from(test_clock());
        let store = InMemoryLeaseStore::new("OccupiedUnicorns", Arc::new(clock.clone()));
        store.put(lease(&clock, "Sparkle", 10)).await.unwrap();

        let worker = WorkerId::new("Sparkle");
        assert!(store.get(&worker).await.unwrap().is_some());

        clock.advance(Duration::from_secs(10));
        assert!(store.get(&worker).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn conditional_put_respects_active_lease() {
        let clock = ManualClock::from(test_clock());
        let store = InMemoryLeaseStore::new("OccupiedUnicorns", Arc::new(clock.clone()));

        assert!(store.put_if_vacant(lease(&clock, "Sparkle", 10), clock.now()).await.unwrap());
        assert!(!store.put_if_vacant(lease(&clock, "Sparkle", 10), clock.now()).await.unwrap());

        clock.advance(Duration::from_secs(11));
        assert!(store.put_if_vacant(lease(&clock, "Sparkle", 10), clock.now()).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_ride_is_not_written_or_streamed() {
        let store = InMemoryRideRecordStore::new("Rides");
        let mut changes = store.changes();
        let record = RideRecord {
            ride_id: RideId::new("ride-1"),
            user: "rider".to_string(),
            email: None,
            unicorn: None,
            request_time: test_clock().now(),
        };

        assert!(store.put_if_absent(record.clone()).await.unwrap());
        assert!(!store.put_if_absent(record.clone()).await.unwrap());
        assert_eq!(store.len(), 1);

        let first = changes.next().await.unwrap();
        assert_eq!(first.kind, ChangeKind::Insert);
        assert_eq!(first.record, record);

        let second = tokio::time::timeout(Duration::from_millis(20), changes.next()).await;
        assert!(second.is_err(), "duplicate insert must not emit a change");
    }

    #[tokio::test]
    async fn increment_creates_then_adds() {
        let store = InMemoryWorkerStatStore::new();
        let worker = WorkerId::new("Sparkle");
        let at = test_clock().now();

        assert_eq!(store.increment(&worker, 1, at).await.unwrap().rides, 1);
        assert_eq!(store.increment(&worker, 2, at).await.unwrap().rides, 3);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
