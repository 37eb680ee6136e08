//! # Wild Rydes Runtime
//!
//! The moving parts of the ride dispatch workflow, built on the traits in
//! [`wild_rydes_core`].
//!
//! ## Components
//!
//! - [`lease::LeaseManager`]: reserves a worker for a bounded window
//! - [`dispatch::RideDispatcher`]: handles a ride request end to end
//! - [`fanout::FanoutEventBus`]: delivers dispatch events to every
//!   subscriber, with redelivery and a dead letter queue
//! - [`consumers`]: receipt pipeline, ride record writer, stats aggregator
//! - [`payroll::PayrollCalculator`]: periodic salary reports
//! - [`memory`]: in-process store backends
//! - [`http`]: HTTP clients for the worker directory and receipt
//!   post-processor
//!
//! ## Request flow
//!
//! ```text
//! POST /ride ──► RideDispatcher ──► WorkerDirectory
//!                      │
//!                      ├──► LeaseManager ──► LeaseStore
//!                      │
//!                      └──► EventBus ──┬──► ReceiptPipeline ──► ArtifactStore, post-processor
//!                                      └──► RideRecordWriter ──► RideRecordStore
//!                                                                     │ change stream
//!                                                                     ▼
//!                                                              StatsAggregator ──► WorkerStatStore
//! ```

pub mod consumers;
pub mod dispatch;
pub mod dlq;
pub mod fanout;
pub mod http;
pub mod lease;
pub mod memory;
pub mod metrics;
pub mod payroll;
pub mod retry;

pub use consumers::{ReceiptPipeline, RideRecordWriter, StatsAggregator};
pub use dispatch::{DispatchPhase, DispatchResponse, RideDispatcher};
pub use dlq::{DeadLetter, DeadLetterQueue};
pub use fanout::{DeliveryOutcome, DeliveryReport, FanoutEventBus};
pub use http::{HttpPostProcessor, HttpWorkerDirectory};
pub use lease::LeaseManager;
pub use memory::{
    InMemoryArtifactStore, InMemoryLeaseStore, InMemoryRideRecordStore, InMemoryWorkerStatStore,
};
pub use payroll::{PayrollCalculator, PayrollError};
pub use retry::RetryPolicy;
