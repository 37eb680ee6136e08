//! HTTP request handlers.

pub mod health;
pub mod receipts;
pub mod ride;

pub use health::health_check;
pub use receipts::post_process_receipt;
pub use ride::{request_ride, ride_preflight};
