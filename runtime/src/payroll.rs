//! Periodic salary reports derived from worker statistics.
//!
//! Each run takes a snapshot of every worker's ride count, prices it at a
//! flat per-ride rate and stores the report as JSON under
//! `salaries/<timestamp>.json`. The calculator only reads statistics.

use crate::metrics::ConsumerMetrics;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use wild_rydes_core::environment::Clock;
use wild_rydes_core::error::StoreError;
use wild_rydes_core::stores::{ArtifactStore, WorkerStatStore};
use wild_rydes_core::types::{SalaryLine, SalaryReport};

/// Default interval between runs.
pub const DEFAULT_PAYROLL_INTERVAL: Duration = Duration::from_secs(240);

/// Payroll failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayrollError {
    /// Reading statistics or writing the report failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The report could not be encoded.
    #[error("Failed to encode salary report: {0}")]
    Encoding(String),
}

/// Computes and stores salary reports.
pub struct PayrollCalculator {
    stats: Arc<dyn WorkerStatStore>,
    reports: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    rate_cents: u64,
}

impl PayrollCalculator {
    /// Calculator paying `rate_cents` per ride.
    #[must_use]
    pub fn new(
        stats: Arc<dyn WorkerStatStore>,
        reports: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
        rate_cents: u64,
    ) -> Self {
        Self {
            stats,
            reports,
            clock,
            rate_cents,
        }
    }

    /// Produce and store one report.
    ///
    /// # Errors
    ///
    /// Returns [`PayrollError`] when statistics cannot be read or the report
    /// cannot be stored.
    pub async fn run(&self) -> Result<SalaryReport, PayrollError> {
        let mut lines: Vec<SalaryLine> = self
            .stats
            .list()
            .await?
            .into_iter()
            .map(|stat| SalaryLine {
                amount_cents: stat.rides.saturating_mul(self.rate_cents),
                name: stat.worker_id,
                rides: stat.rides,
            })
            .collect();
        lines.sort_by(|a, b| a.name.cmp(&b.name));

        let report = SalaryReport {
            generated_at: self.clock.now(),
            rate_cents: self.rate_cents,
            lines,
        };
        let bytes =
            serde_json::to_vec(&report).map_err(|e| PayrollError::Encoding(e.to_string()))?;
        self.reports.put(report.key(), bytes).await?;

        ConsumerMetrics::record_payroll_run();
        tracing::info!(key = %report.key(), workers = report.lines.len(), "Salary report written");
        Ok(report)
    }

    /// Run every `period` until the task is dropped. A failed run is logged
    /// and the next one proceeds on schedule.
    pub async fn run_every(&self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; the first report is due one
        // period after startup.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(error) = self.run().await {
                tracing::error!(error = %error, "Payroll run failed");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryArtifactStore, InMemoryWorkerStatStore};
    use wild_rydes_core::types::WorkerId;
    use wild_rydes_testing::test_clock;

    #[tokio::test]
    async fn report_prices_rides_and_is_stored() {
        let stats = Arc::new(InMemoryWorkerStatStore::new());
        let reports = Arc::new(InMemoryArtifactStore::new());
        let at = test_clock().now();
        stats.increment(&WorkerId::new("Shadowfax"), 2, at).await.unwrap();
        stats.increment(&WorkerId::new("Bucephalus"), 5, at).await.unwrap();
        let payroll = PayrollCalculator::new(stats, reports.clone(), Arc::new(test_clock()), 150);

        let report = payroll.run().await.unwrap();

        let names: Vec<&str> = report.lines.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Bucephalus", "Shadowfax"]);
        assert_eq!(report.lines[0].amount_cents, 750);
        assert_eq!(report.lines[1].amount_cents, 300);

        let stored = reports.get(&report.key()).await.unwrap().unwrap();
        let decoded: SalaryReport = serde_json::from_slice(&stored).unwrap();
        assert_eq!(decoded, report);
        assert_eq!(report.key(), "salaries/2025-01-01T00:00:00+00:00.json");
    }

    #[tokio::test]
    async fn empty_stats_still_write_a_report() {
        let reports = Arc::new(InMemoryArtifactStore::new());
        let payroll = PayrollCalculator::new(
            Arc::new(InMemoryWorkerStatStore::new()),
            reports.clone(),
            Arc::new(test_clock()),
            100,
        );

        let report = payroll.run().await.unwrap();

        assert!(report.lines.is_empty());
        assert_eq!(reports.keys().len(), 1);
    }
}
