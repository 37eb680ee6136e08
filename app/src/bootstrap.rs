//! Wiring of the ride API process.
//!
//! The ride API process hosts the whole dispatch workflow: the orchestrator
//! behind `POST /ride`, the fan-out bus with its two subscribers, the stats
//! aggregator on the ride record change stream and the payroll schedule.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = Config::from_env();
//! let app = RideApi::build(&config);
//! app.run(listener).await?;
//! ```

use crate::config::Config;
use crate::lifecycle::shutdown_signal;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;
use wild_rydes_core::environment::{Clock, SystemClock, ThreadRandom};
use wild_rydes_core::services::{ReceiptPostProcessor, WorkerDirectory};
use wild_rydes_core::stores::RideRecordStore;
use wild_rydes_runtime::metrics::register_metrics;
use wild_rydes_runtime::{
    FanoutEventBus, HttpPostProcessor, HttpWorkerDirectory, InMemoryArtifactStore,
    InMemoryLeaseStore, InMemoryRideRecordStore, InMemoryWorkerStatStore, LeaseManager,
    PayrollCalculator, ReceiptPipeline, RideDispatcher, RideRecordWriter, StatsAggregator,
};
use wild_rydes_web::{RideApiState, ride_router};

/// Stores backing the workflow, kept for inspection.
#[derive(Clone)]
pub struct Stores {
    /// Worker leases
    pub leases: Arc<InMemoryLeaseStore>,
    /// Ride records
    pub rides: Arc<InMemoryRideRecordStore>,
    /// Per-worker ride counts
    pub stats: Arc<InMemoryWorkerStatStore>,
    /// Receipt artifacts
    pub receipts: Arc<InMemoryArtifactStore>,
    /// Salary reports
    pub salaries: Arc<InMemoryArtifactStore>,
}

/// Assembled ride API process.
pub struct RideApi {
    /// HTTP routes
    pub router: Router,
    /// Fan-out bus the dispatcher publishes to
    pub bus: Arc<FanoutEventBus>,
    /// Backing stores
    pub stores: Stores,
    /// Aggregator consuming the ride record change stream
    pub stats: Arc<StatsAggregator>,
    background: Vec<JoinHandle<()>>,
}

impl RideApi {
    /// Build the process with HTTP clients for the worker directory and the
    /// receipt service.
    ///
    /// Spawns background tasks, so it must be called inside a Tokio runtime.
    #[must_use]
    pub fn build(config: &Config) -> Self {
        let directory = HttpWorkerDirectory::new(
            config.dispatch.directory_endpoint.clone(),
            config.dispatch.call_timeout,
        );
        let processor = HttpPostProcessor::new(
            config.receipt.post_processing_url.clone(),
            config.receipt.call_timeout,
        );
        Self::assemble(config, Arc::new(directory), Arc::new(processor))
    }

    /// Build the process around the given outbound collaborators.
    ///
    /// Spawns background tasks, so it must be called inside a Tokio runtime.
    #[must_use]
    pub fn assemble(
        config: &Config,
        directory: Arc<dyn WorkerDirectory>,
        processor: Arc<dyn ReceiptPostProcessor>,
    ) -> Self {
        register_metrics();

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let names = &config.stores;
        let stores = Stores {
            leases: Arc::new(InMemoryLeaseStore::new(
                names.occupied_unicorns.clone(),
                Arc::clone(&clock),
            )),
            rides: Arc::new(InMemoryRideRecordStore::new(names.rides.clone())),
            stats: Arc::new(InMemoryWorkerStatStore::new()),
            receipts: Arc::new(InMemoryArtifactStore::new()),
            salaries: Arc::new(InMemoryArtifactStore::new()),
        };

        let policy = config.redelivery.policy();
        let bus = Arc::new(FanoutEventBus::new(policy.clone()));
        let topic = config.dispatch.dispatch_topic.clone();
        bus.subscribe(
            topic.clone(),
            Arc::new(ReceiptPipeline::new(
                stores.receipts.clone(),
                processor,
                config.receipt.clone(),
            )),
        );
        bus.subscribe(
            topic,
            Arc::new(RideRecordWriter::new(
                stores.rides.clone(),
                config.dispatch.call_timeout,
            )),
        );

        // Subscribe before any ride can be written so no change is missed.
        let changes = stores.rides.changes();
        let stats = Arc::new(StatsAggregator::new(
            stores.stats.clone(),
            Arc::clone(&clock),
            policy,
        ));
        let aggregator = Arc::clone(&stats);
        let stats_task = tokio::spawn(async move { aggregator.run(changes).await });

        let payroll = PayrollCalculator::new(
            stores.stats.clone(),
            stores.salaries.clone(),
            Arc::clone(&clock),
            config.payroll.rate_cents,
        );
        let interval = config.payroll.interval;
        let payroll_task = tokio::spawn(async move { payroll.run_every(interval).await });

        let dispatcher = RideDispatcher::new(
            config.dispatch.clone(),
            directory,
            LeaseManager::new(stores.leases.clone(), Arc::clone(&clock)),
            bus.clone(),
            clock,
            Arc::new(ThreadRandom),
        );

        info!(
            topic = %config.dispatch.dispatch_topic,
            directory_configured = config.dispatch.directory_endpoint.is_some(),
            "Ride API assembled"
        );

        Self {
            router: ride_router(RideApiState::new(dispatcher)),
            bus,
            stores,
            stats,
            background: vec![stats_task, payroll_task],
        }
    }

    /// Serve on `listener` until a shutdown signal, then stop the
    /// background tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails.
    pub async fn run(self, listener: TcpListener) -> std::io::Result<()> {
        info!(address = ?listener.local_addr().ok(), "HTTP server listening for requests");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server stopped, stopping background tasks");
        for task in self.background {
            task.abort();
        }
        Ok(())
    }
}

