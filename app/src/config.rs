//! Configuration management for the Wild Rydes services.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unparseable numbers fall back to their default.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use wild_rydes_core::config::{DEFAULT_DISPATCH_TOPIC, DispatchConfig, ReceiptConfig, StoreNames};
use wild_rydes_runtime::RetryPolicy;
use wild_rydes_runtime::payroll::DEFAULT_PAYROLL_INTERVAL;
use wild_rydes_web::state::DEFAULT_SUCCESS_RATE;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ride dispatch orchestrator
    pub dispatch: DispatchConfig,
    /// Receipt pipeline
    pub receipt: ReceiptConfig,
    /// Table and bucket names
    pub stores: StoreNames,
    /// Event bus and change stream redelivery
    pub redelivery: RedeliveryConfig,
    /// Salary reports
    pub payroll: PayrollConfig,
    /// Ride API listener
    pub server: ServerConfig,
    /// Receipt post-processing service
    pub receipt_service: ReceiptServiceConfig,
}

/// Redelivery configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeliveryConfig {
    /// Redeliveries after the first attempt
    pub max_retries: usize,
    /// Delay before the first redelivery
    pub initial_delay: Duration,
}

impl RedeliveryConfig {
    /// Exponential backoff policy for these settings.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.max_retries)
            .initial_delay(self.initial_delay)
            .build()
    }
}

/// Payroll configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollConfig {
    /// Time between salary reports
    pub interval: Duration,
    /// Pay per ride
    pub rate_cents: u64,
}

/// Ride API server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` to bind.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Receipt service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptServiceConfig {
    /// Host and port to bind to
    pub server: ServerConfig,
    /// Share of receipts accepted
    pub success_rate: f64,
}

/// Default pay per ride.
pub const DEFAULT_RATE_CENTS: u64 = 100;

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let stores = StoreNames::default();
        let call_timeout = Duration::from_millis(parsed(&lookup, "CALL_TIMEOUT_MS", 5_000));
        let host = text("HOST", "0.0.0.0");

        Self {
            dispatch: DispatchConfig {
                directory_endpoint: lookup("UNICORN_STABLE_API").filter(|s| !s.trim().is_empty()),
                dispatch_topic: text("UNICORN_DISPATCHED_TOPIC", DEFAULT_DISPATCH_TOPIC),
                lease_duration: Duration::from_secs(parsed(&lookup, "LEASE_SECONDS", 10)),
                min_ride_seconds: parsed(&lookup, "MIN_RIDE_LENGTH_SECONDS", 4),
                max_ride_seconds: parsed(&lookup, "MAX_RIDE_LENGTH_SECONDS", 10),
                call_timeout,
            },
            receipt: ReceiptConfig {
                post_processing_url: text(
                    "RECEIPT_SERVICE_URL",
                    &ReceiptConfig::default().post_processing_url,
                ),
                call_timeout,
            },
            stores: StoreNames {
                occupied_unicorns: text("OCCUPIED_UNICORNS_TABLE", &stores.occupied_unicorns),
                rides: text("RIDES_TABLE", &stores.rides),
                unicorn_stats: text("UNICORN_STATS_TABLE", &stores.unicorn_stats),
                receipts: text("RECEIPTS_BUCKET", &stores.receipts),
                salaries: text("SALARIES_BUCKET", &stores.salaries),
            },
            redelivery: RedeliveryConfig {
                max_retries: parsed(&lookup, "REDELIVERY_MAX_RETRIES", 3),
                initial_delay: Duration::from_millis(parsed(
                    &lookup,
                    "REDELIVERY_INITIAL_DELAY_MS",
                    100,
                )),
            },
            payroll: PayrollConfig {
                interval: Duration::from_secs(parsed(
                    &lookup,
                    "PAYROLL_INTERVAL_SECS",
                    DEFAULT_PAYROLL_INTERVAL.as_secs(),
                )),
                rate_cents: parsed(&lookup, "PAYROLL_RATE_CENTS", DEFAULT_RATE_CENTS),
            },
            server: ServerConfig {
                host: host.clone(),
                port: parsed(&lookup, "PORT", 8080),
            },
            receipt_service: ReceiptServiceConfig {
                server: ServerConfig {
                    host,
                    port: parsed(&lookup, "SERVER_PORT", 5000),
                },
                success_rate: parsed(&lookup, "RECEIPT_SUCCESS_RATE", DEFAULT_SUCCESS_RATE),
            },
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
