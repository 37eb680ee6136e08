//! # Wild Rydes Testing
//!
//! Deterministic stand-ins for the collaborators that carry external
//! nondeterminism: time, random draws, worker selection, the flaky receipt
//! post-processor and the event bus.
//!
//! ## Example
//!
//! ```ignore
//! use wild_rydes_testing::{ManualClock, StaticWorkerDirectory, test_clock};
//!
//! #[tokio::test]
//! async fn dispatches_sparkle() {
//!     let clock = ManualClock::from(test_clock());
//!     let directory = StaticWorkerDirectory::returning(Unicorn::named("Sparkle"));
//!     // build a RideDispatcher with these and assert on the response
//! }
//! ```

use chrono::{DateTime, Utc};
use wild_rydes_core::environment::Clock;

/// Mock implementations of the collaborator traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;
    use wild_rydes_core::environment::RandomSource;
    use wild_rydes_core::error::{DirectoryError, PostProcessError};
    use wild_rydes_core::event::SerializedEvent;
    use wild_rydes_core::event_bus::{EventBus, EventBusError};
    use wild_rydes_core::services::{ReceiptPostProcessor, WorkerDirectory};
    use wild_rydes_core::types::{Location, ReceiptArtifact, Unicorn};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use wild_rydes_testing::mocks::FixedClock;
    /// use wild_rydes_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the component under test.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Start at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move time forward.
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        }

        /// Jump to an absolute time.
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl From<FixedClock> for ManualClock {
        fn from(clock: FixedClock) -> Self {
            Self::new(clock.now())
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Random source replaying a fixed sequence of draws.
    ///
    /// Draws cycle once the sequence is exhausted.
    #[derive(Debug, Clone)]
    pub struct SequenceRandom {
        draws: Arc<Vec<f64>>,
        next: Arc<Mutex<usize>>,
    }

    impl SequenceRandom {
        /// Replay `draws` in order. An empty sequence always draws `0.0`.
        #[must_use]
        pub fn new(draws: Vec<f64>) -> Self {
            Self {
                draws: Arc::new(draws),
                next: Arc::new(Mutex::new(0)),
            }
        }

        /// Always draw `value`.
        #[must_use]
        pub fn constant(value: f64) -> Self {
            Self::new(vec![value])
        }
    }

    impl RandomSource for SequenceRandom {
        fn unit(&self) -> f64 {
            if self.draws.is_empty() {
                return 0.0;
            }
            let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
            let draw = self.draws[*next % self.draws.len()];
            *next += 1;
            draw
        }
    }

    /// Worker directory returning a fixed answer and counting lookups.
    #[derive(Debug, Clone)]
    pub struct StaticWorkerDirectory {
        answer: Result<Unicorn, DirectoryError>,
        lookups: Arc<Mutex<Vec<Location>>>,
    }

    impl StaticWorkerDirectory {
        /// Always return `unicorn`.
        #[must_use]
        pub fn returning(unicorn: Unicorn) -> Self {
            Self {
                answer: Ok(unicorn),
                lookups: Arc::default(),
            }
        }

        /// Always fail with `error`.
        #[must_use]
        pub fn failing(error: DirectoryError) -> Self {
            Self {
                answer: Err(error),
                lookups: Arc::default(),
            }
        }

        /// Pickup points looked up so far.
        #[must_use]
        pub fn lookups(&self) -> Vec<Location> {
            self.lookups
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    impl WorkerDirectory for StaticWorkerDirectory {
        fn find_unicorn(
            &self,
            pickup: Location,
        ) -> Pin<Box<dyn Future<Output = Result<Unicorn, DirectoryError>> + Send + '_>> {
            self.lookups
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(pickup);
            let answer = self.answer.clone();
            Box::pin(async move { answer })
        }
    }

    /// Post-processor answering from a script of outcomes.
    ///
    /// `true` is a success, `false` a `500 BORKED`. Once the script runs out
    /// every call succeeds.
    #[derive(Debug, Clone, Default)]
    pub struct ScriptedPostProcessor {
        script: Arc<Mutex<VecDeque<bool>>>,
        received: Arc<Mutex<Vec<ReceiptArtifact>>>,
    }

    impl ScriptedPostProcessor {
        /// Answer with `outcomes` in order.
        #[must_use]
        pub fn new(outcomes: impl IntoIterator<Item = bool>) -> Self {
            Self {
                script: Arc::new(Mutex::new(outcomes.into_iter().collect())),
                received: Arc::default(),
            }
        }

        /// Artifacts submitted so far, including failed attempts.
        #[must_use]
        pub fn received(&self) -> Vec<ReceiptArtifact> {
            self.received
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    impl ReceiptPostProcessor for ScriptedPostProcessor {
        fn process<'a>(
            &'a self,
            artifact: &'a ReceiptArtifact,
        ) -> Pin<Box<dyn Future<Output = Result<(), PostProcessError>> + Send + 'a>> {
            self.received
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(artifact.clone());
            let succeed = self
                .script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or(true);
            Box::pin(async move {
                if succeed {
                    Ok(())
                } else {
                    Err(PostProcessError::Status {
                        status: 500,
                        body: "BORKED".to_string(),
                    })
                }
            })
        }
    }

    /// Event bus that records publications instead of delivering them.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingEventBus {
        published: Arc<Mutex<Vec<(String, SerializedEvent)>>>,
        fail_with: Option<String>,
    }

    impl RecordingEventBus {
        /// Accept every publication.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Refuse every publication with `reason`.
        #[must_use]
        pub fn failing(reason: impl Into<String>) -> Self {
            Self {
                published: Arc::default(),
                fail_with: Some(reason.into()),
            }
        }

        /// `(topic, event)` pairs accepted so far.
        #[must_use]
        pub fn published(&self) -> Vec<(String, SerializedEvent)> {
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    impl EventBus for RecordingEventBus {
        fn publish<'a>(
            &'a self,
            topic: &'a str,
            event: &'a SerializedEvent,
        ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + 'a>> {
            Box::pin(async move {
                if let Some(reason) = &self.fail_with {
                    return Err(EventBusError::PublishFailed {
                        topic: topic.to_string(),
                        reason: reason.clone(),
                    });
                }
                self.published
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((topic.to_string(), event.clone()));
                Ok(())
            })
        }
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use wild_rydes_core::types::AuthContext;

    /// Authenticated rider used across tests.
    #[must_use]
    pub fn rider() -> AuthContext {
        AuthContext {
            username: "rider".to_string(),
            email: Some("rider@example.com".to_string()),
        }
    }

    /// `POST /ride` body for a pickup point.
    #[must_use]
    pub fn ride_body(latitude: f64, longitude: f64) -> String {
        serde_json::json!({
            "PickupLocation": { "Latitude": latitude, "Longitude": longitude }
        })
        .to_string()
    }
}

// Re-export commonly used items
pub use helpers::{ride_body, rider};
pub use mocks::{
    FixedClock, ManualClock, RecordingEventBus, ScriptedPostProcessor, SequenceRandom,
    StaticWorkerDirectory, test_clock,
};
