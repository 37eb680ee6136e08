//! # Wild Rydes Core
//!
//! Domain types, event model and collaborator traits for the Wild Rydes
//! ride dispatch workflow.
//!
//! A client requests a ride, a worker ("unicorn") is reserved for a bounded
//! lease window, a dispatch event is published, and independent consumers
//! record the ride, post-process a receipt and accumulate per-worker
//! statistics.
//!
//! ## Crate Layout
//!
//! - [`types`]: wire and storage types (`RideDispatchEvent`, `WorkerLease`, ...)
//! - [`event`]: the [`event::Event`] trait and the [`event::SerializedEvent`] wire format
//! - [`event_bus`]: publish / fan-out abstractions
//! - [`stores`]: key-value store traits (leases, ride records, stats, artifacts)
//! - [`services`]: outbound collaborators (worker directory, receipt post-processor)
//! - [`environment`]: injected clock and random source
//! - [`config`]: explicit component configuration
//! - [`error`]: error taxonomy
//!
//! All collaborator traits return `Pin<Box<dyn Future>>` so they can be held
//! as `Arc<dyn Trait>` by the runtime components.

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod services;
pub mod stores;
pub mod types;

/// Environment module - injected sources of time and randomness.
///
/// Both are external nondeterminism: the worker directory's choice, the
/// ETA draw and the post-processing failure draw all go through
/// [`environment::RandomSource`], and every expiry decision goes through
/// [`environment::Clock`].
pub mod environment {
    use chrono::{DateTime, Utc};
    use rand::Rng;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Source of uniform draws in `[0, 1)`.
    pub trait RandomSource: Send + Sync {
        /// Draw a value uniformly from `[0, 1)`.
        fn unit(&self) -> f64;
    }

    /// Thread-local RNG backed random source.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ThreadRandom;

    impl RandomSource for ThreadRandom {
        fn unit(&self) -> f64 {
            rand::thread_rng().gen_range(0.0..1.0)
        }
    }
}
