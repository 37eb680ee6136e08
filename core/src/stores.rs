//! Key-value store traits.
//!
//! Each store is keyed by a primary key and owned by exactly one component:
//!
//! - [`LeaseStore`]: worker leases, owned by the lease manager
//! - [`RideRecordStore`]: ride records, owned by the ride record writer
//! - [`WorkerStatStore`]: per-worker totals, owned by the stats aggregator
//! - [`ArtifactStore`]: opaque blobs (receipts, salary reports)
//!
//! No operation spans more than one row and none spans stores.

use crate::error::StoreError;
use crate::types::{RideId, RideRecord, RideRecordChange, WorkerId, WorkerLease, WorkerStat};
use chrono::{DateTime, Utc};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;

/// Future returned by every store operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Stream of ride record changes, in commit order.
pub type ChangeStream = Pin<Box<dyn Stream<Item = RideRecordChange> + Send>>;

/// Worker lease rows with time-to-live.
pub trait LeaseStore: Send + Sync {
    /// Read the lease row for a worker.
    ///
    /// A store honoring TTL may already have dropped an expired row; callers
    /// must still check expiry themselves.
    fn get<'a>(&'a self, worker_id: &'a WorkerId) -> StoreFuture<'a, Option<WorkerLease>>;

    /// Write a lease row, replacing whatever was there.
    fn put(&self, lease: WorkerLease) -> StoreFuture<'_, ()>;

    /// Write a lease row only if no row exists or the existing row has
    /// expired at `now`. Returns whether the row was written.
    ///
    /// This is the single-row conditional write used by the atomic
    /// reservation mode.
    fn put_if_vacant(&self, lease: WorkerLease, now: DateTime<Utc>) -> StoreFuture<'_, bool>;
}

/// Ride records keyed by ride id, with a change stream.
pub trait RideRecordStore: Send + Sync {
    /// Insert a record unless one with the same ride id exists.
    ///
    /// Returns `false` when the row already existed; nothing is written and
    /// no change is emitted in that case.
    fn put_if_absent(&self, record: RideRecord) -> StoreFuture<'_, bool>;

    /// Read a record.
    fn get<'a>(&'a self, ride_id: &'a RideId) -> StoreFuture<'a, Option<RideRecord>>;

    /// Subscribe to changes committed after this call.
    fn changes(&self) -> ChangeStream;
}

/// Running totals per worker.
pub trait WorkerStatStore: Send + Sync {
    /// Add `by` to the worker's ride count, creating the row at zero first
    /// if it does not exist. Returns the row after the update.
    fn increment<'a>(
        &'a self,
        worker_id: &'a WorkerId,
        by: u64,
        at: DateTime<Utc>,
    ) -> StoreFuture<'a, WorkerStat>;

    /// Read one worker's row.
    fn get<'a>(&'a self, worker_id: &'a WorkerId) -> StoreFuture<'a, Option<WorkerStat>>;

    /// Read every row.
    fn list(&self) -> StoreFuture<'_, Vec<WorkerStat>>;
}

/// Opaque object storage.
pub trait ArtifactStore: Send + Sync {
    /// Store bytes under a key, replacing any previous object.
    fn put(&self, key: String, bytes: Vec<u8>) -> StoreFuture<'_, ()>;

    /// Fetch an object.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>>;
}
