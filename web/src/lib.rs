//! Axum front end for the Wild Rydes dispatch workflow.
//!
//! Two services live here:
//!
//! - the **ride API** ([`router::ride_router`]), which turns `POST /ride`
//!   into a call to [`wild_rydes_runtime::RideDispatcher`]
//! - the **receipt service** ([`router::receipt_router`]), the unreliable
//!   post-processing endpoint the receipt pipeline submits to
//!
//! # Request Flow
//!
//! 1. **Middleware** assigns a request reference and opens a tracing span
//! 2. **Extract** the authorizer identity and the raw body
//! 3. **Dispatch** through the ride dispatcher
//! 4. **Map result** to `201` or a `500 {Error, Reference}` via [`AppError`]
//! 5. **CORS headers** are stamped on the way out
//!
//! # Example
//!
//! ```ignore
//! use wild_rydes_web::{ride_router, RideApiState};
//!
//! let app = ride_router(RideApiState::new(dispatcher));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::Identity;
pub use middleware::{REQUEST_ID_HEADER, RequestReference, request_reference_layer};
pub use router::{receipt_router, ride_router};
pub use state::{ReceiptServiceState, RideApiState};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
