//! Metrics for the dispatch workflow.
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the embedding application. Without one, every call is a no-op.
//!
//! # Example
//!
//! ```rust
//! use wild_rydes_runtime::metrics::{register_metrics, DispatchMetrics};
//! use std::time::Duration;
//!
//! register_metrics();
//! DispatchMetrics::record_response(201, Duration::from_millis(12));
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use std::time::Duration;
use wild_rydes_core::types::LeaseOutcome;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Register all metric descriptions.
///
/// Call once at startup, after installing a recorder.
pub fn register_metrics() {
    // Ride API
    describe_counter!(
        "ride_requests_total",
        "Ride requests handled, labelled by response status"
    );
    describe_counter!(
        "ride_request_errors_total",
        "Ride requests answered with 500, labelled by error kind"
    );
    describe_histogram!(
        "ride_request_duration_seconds",
        "Time taken to handle a ride request"
    );

    // Leases
    describe_counter!(
        "lease_reservations_total",
        "Reservation attempts, labelled by outcome"
    );

    // Fan-out
    describe_counter!(
        "event_bus_messages_published_total",
        "Events accepted for fan-out"
    );
    describe_counter!(
        "event_bus_deliveries_total",
        "Deliveries to subscribers, labelled by subscriber and outcome"
    );
    describe_counter!(
        "event_bus_redeliveries_total",
        "Redeliveries after an unacknowledged delivery"
    );
    describe_counter!(
        "dlq_pushed_total",
        "Deliveries moved to a dead letter queue, labelled by consumer"
    );
    describe_counter!(
        "dlq_dropped_total",
        "Dead letters dropped because the queue was full"
    );
    describe_gauge!("dlq_size", "Entries currently held in the dead letter queue");

    // Consumers
    describe_counter!(
        "receipts_post_processed_total",
        "Receipt post-processing calls, labelled by outcome"
    );
    describe_counter!(
        "worker_stat_increments_total",
        "Worker statistic increments applied"
    );
    describe_counter!("payroll_runs_total", "Salary reports written");
}

/// Ride API metrics recorder.
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record a response.
    pub fn record_response(status: u16, duration: Duration) {
        counter!("ride_requests_total", "status" => status.to_string()).increment(1);
        histogram!("ride_request_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record the kind of a failed request.
    pub fn record_error(kind: &'static str) {
        counter!("ride_request_errors_total", "kind" => kind).increment(1);
    }
}

/// Lease metrics recorder.
pub struct LeaseMetrics;

impl LeaseMetrics {
    /// Record a reservation outcome.
    pub fn record_outcome(outcome: LeaseOutcome) {
        let label = match outcome {
            LeaseOutcome::Reserved => "reserved",
            LeaseOutcome::Occupied => "occupied",
        };
        counter!("lease_reservations_total", "outcome" => label).increment(1);
    }
}

/// Event bus metrics recorder.
pub struct EventBusMetrics;

impl EventBusMetrics {
    /// Record an accepted publication.
    pub fn record_publish() {
        counter!("event_bus_messages_published_total").increment(1);
    }

    /// Record the final outcome of one subscriber's delivery.
    pub fn record_delivery(subscriber: &str, acknowledged: bool, attempts: usize) {
        let outcome = if acknowledged { "acknowledged" } else { "dead_lettered" };
        counter!(
            "event_bus_deliveries_total",
            "subscriber" => subscriber.to_string(),
            "outcome" => outcome
        )
        .increment(1);
        if attempts > 1 {
            counter!("event_bus_redeliveries_total").increment((attempts - 1) as u64);
        }
    }
}

/// Consumer metrics recorder.
pub struct ConsumerMetrics;

impl ConsumerMetrics {
    /// Record a receipt post-processing call.
    pub fn record_post_processing(succeeded: bool) {
        let outcome = if succeeded { "ok" } else { "failed" };
        counter!("receipts_post_processed_total", "outcome" => outcome).increment(1);
    }

    /// Record an applied stat increment.
    pub fn record_stat_increment() {
        counter!("worker_stat_increments_total").increment(1);
    }

    /// Record a written salary report.
    pub fn record_payroll_run() {
        counter!("payroll_runs_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_a_recorder_is_a_no_op() {
        register_metrics();
        DispatchMetrics::record_response(500, Duration::from_millis(3));
        DispatchMetrics::record_error("infrastructure");
        LeaseMetrics::record_outcome(LeaseOutcome::Occupied);
        EventBusMetrics::record_delivery("receipts", false, 4);
    }
}
