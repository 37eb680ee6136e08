//! Worker lease manager.
//!
//! A lease holds a worker for a bounded window. A worker is occupied while
//! its lease row exists and `expires_at` is strictly after now; expired rows
//! are simply overwritten.
//!
//! By default reservation is read-then-write: two concurrent callers can
//! both observe a vacant worker and both reserve it, the later write
//! winning. With the `atomic-lease` feature the manager uses the store's
//! conditional write instead, so at most one of them reserves.

use crate::metrics::LeaseMetrics;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use wild_rydes_core::environment::Clock;
use wild_rydes_core::error::StoreError;
use wild_rydes_core::stores::LeaseStore;
use wild_rydes_core::types::{LeaseOutcome, WorkerId, WorkerLease};

/// Reserves workers against a [`LeaseStore`].
#[derive(Clone)]
pub struct LeaseManager {
    store: Arc<dyn LeaseStore>,
    clock: Arc<dyn Clock>,
}

impl LeaseManager {
    /// Manager over `store`, reading time from `clock`.
    #[must_use]
    pub fn new(store: Arc<dyn LeaseStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Try to reserve `worker_id` for `lease_duration`.
    ///
    /// `Occupied` writes nothing. A store failure is returned as an error,
    /// never reported as `Occupied`.
    ///
    /// # Errors
    ///
    /// Returns the [`StoreError`] of the failed read or write.
    #[tracing::instrument(skip(self), fields(worker_id = %worker_id))]
    pub async fn reserve(
        &self,
        worker_id: &WorkerId,
        lease_duration: Duration,
    ) -> Result<LeaseOutcome, StoreError> {
        let now = self.clock.now();
        let expires_at = chrono::Duration::from_std(lease_duration)
            .ok()
            .and_then(|window| now.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let lease = WorkerLease {
            worker_id: worker_id.clone(),
            expires_at,
        };

        let outcome = self.write_lease(lease, now).await?;

        match outcome {
            LeaseOutcome::Reserved => tracing::debug!("Worker reserved"),
            LeaseOutcome::Occupied => tracing::info!("Worker already leased"),
        }
        LeaseMetrics::record_outcome(outcome);

        Ok(outcome)
    }

    #[cfg(not(feature = "atomic-lease"))]
    async fn write_lease(
        &self,
        lease: WorkerLease,
        now: DateTime<Utc>,
    ) -> Result<LeaseOutcome, StoreError> {
        let existing = self.store.get(&lease.worker_id).await?;
        if existing.is_some_and(|held| held.is_active_at(now)) {
            return Ok(LeaseOutcome::Occupied);
        }
        self.store.put(lease).await?;
        Ok(LeaseOutcome::Reserved)
    }

    #[cfg(feature = "atomic-lease")]
    async fn write_lease(
        &self,
        lease: WorkerLease,
        now: DateTime<Utc>,
    ) -> Result<LeaseOutcome, StoreError> {
        if self.store.put_if_vacant(lease, now).await? {
            Ok(LeaseOutcome::Reserved)
        } else {
            Ok(LeaseOutcome::Occupied)
        }
    }
}
