//! Component configuration.
//!
//! Every component receives its configuration at construction; nothing reads
//! the process environment at request time. Loading from the environment is
//! the application's job.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Topic the dispatch events are published to.
pub const DEFAULT_DISPATCH_TOPIC: &str = "unicorn-dispatched";

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Worker directory host and path prefix, `None` when unset
    pub directory_endpoint: Option<String>,
    /// Topic for dispatch events
    pub dispatch_topic: String,
    /// How long a reservation holds a worker
    pub lease_duration: Duration,
    /// Lower ETA bound, inclusive
    pub min_ride_seconds: u64,
    /// Upper ETA bound, exclusive
    pub max_ride_seconds: u64,
    /// Limit applied to every outbound call
    pub call_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            directory_endpoint: None,
            dispatch_topic: DEFAULT_DISPATCH_TOPIC.to_string(),
            lease_duration: Duration::from_secs(10),
            min_ride_seconds: 4,
            max_ride_seconds: 10,
            call_timeout: Duration::from_secs(5),
        }
    }
}

/// Receipt pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptConfig {
    /// `PUT` target of the post-processing service
    pub post_processing_url: String,
    /// Limit for the artifact write and the post-processing call
    pub call_timeout: Duration,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            post_processing_url: "http://localhost:5000/api/receipts".to_string(),
            call_timeout: Duration::from_secs(5),
        }
    }
}

/// Table and bucket identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreNames {
    /// Lease table
    pub occupied_unicorns: String,
    /// Ride record table
    pub rides: String,
    /// Worker statistics table
    pub unicorn_stats: String,
    /// Receipt bucket
    pub receipts: String,
    /// Salary report bucket
    pub salaries: String,
}

impl Default for StoreNames {
    fn default() -> Self {
        Self {
            occupied_unicorns: "OccupiedUnicorns".to_string(),
            rides: "Rides".to_string(),
            unicorn_stats: "UnicornStats".to_string(),
            receipts: "Receipts".to_string(),
            salaries: "UnicornSalaries".to_string(),
        }
    }
}
