//! Consumers of the dispatch event and of the ride record change stream.
//!
//! - [`ReceiptPipeline`]: stores the receipt and submits it for
//!   post-processing
//! - [`RideRecordWriter`]: persists one ride record per ride id
//! - [`StatsAggregator`]: counts rides per worker from the change stream
//!
//! All of them tolerate duplicate delivery.

mod receipt;
mod ride_record;
mod stats;

pub use receipt::ReceiptPipeline;
pub use ride_record::RideRecordWriter;
pub use stats::StatsAggregator;

use wild_rydes_core::event::{SerializedEvent, UNICORN_DISPATCHED};
use wild_rydes_core::event_bus::HandlerError;
use wild_rydes_core::types::RideDispatchEvent;

/// Decode a dispatch event; a payload that does not decode can never be
/// processed and is rejected.
fn decode_dispatch(event: &SerializedEvent) -> Result<RideDispatchEvent, HandlerError> {
    event
        .decode(UNICORN_DISPATCHED)
        .map_err(|e| HandlerError::Rejected(e.to_string()))
}
