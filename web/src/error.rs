//! Error responses.
//!
//! Every failure on the ride API answers with the same body shape,
//! `{"Error": ..., "Reference": ...}`, where `Reference` is the request
//! reference the client can quote back.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use wild_rydes_core::types::ErrorResponse;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(reference: RequestReference) -> Result<Json<Data>, AppError> {
///     let data = load().await
///         .map_err(|e| AppError::internal(e.to_string(), &reference.0))?;
///     Ok(Json(data))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Request reference echoed to the client
    reference: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, reference: String) -> Self {
        Self {
            status,
            message,
            reference,
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            reference.into(),
        )
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.reference, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// A dispatcher failure is always a `500`.
impl From<ErrorResponse> for AppError {
    fn from(response: ErrorResponse) -> Self {
        Self::internal(response.error, response.reference)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    reference = %self.reference,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::debug!(
                    status = %self.status,
                    reference = %self.reference,
                    message = %self.message,
                    "Responding with error"
                );
            }
        }

        let body = ErrorResponse {
            error: self.message,
            reference: self.reference,
        };

        (self.status, Json(body)).into_response()
    }
}
