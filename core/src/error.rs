//! Error taxonomy.
//!
//! | Error | Raised by | Observable result |
//! |-------|-----------|-------------------|
//! | [`DispatchError::AuthorizationMissing`] | ride API | `500 {Error, Reference}` |
//! | [`DispatchError::MalformedRequest`] | ride API | `500 {Error, Reference}` |
//! | [`DispatchError::DirectoryLookup`] | worker directory | `500 {Error, Reference}` |
//! | [`DispatchError::Infrastructure`] | stores, bus, timeouts | `500 {Error, Reference}` |
//! | [`PostProcessError`] | receipt post-processor | handler not acknowledged, redelivered |
//!
//! An occupied worker is not an error: see [`crate::types::LeaseOutcome`].

use crate::event_bus::EventBusError;
use std::time::Duration;
use thiserror::Error;

/// Backing store failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or refused the operation.
    #[error("{store}: {reason}")]
    Unavailable {
        /// Table or bucket name
        store: String,
        /// Underlying reason
        reason: String,
    },

    /// A stored row could not be decoded.
    #[error("{store}: corrupt row '{key}'")]
    Corrupt {
        /// Table or bucket name
        store: String,
        /// Row key
        key: String,
    },

    /// The operation did not complete in time.
    #[error("{store}: timed out after {elapsed:?}")]
    Timeout {
        /// Table or bucket name
        store: String,
        /// Configured limit
        elapsed: Duration,
    },
}

/// Worker directory failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// No directory endpoint configured.
    #[error("UNICORN_STABLE_API environment variable is missing")]
    NotConfigured,

    /// The request failed or returned a non-success status.
    #[error("Worker directory request failed: {0}")]
    Request(String),

    /// The response body was not a worker record.
    #[error("Worker directory returned an invalid worker: {0}")]
    InvalidResponse(String),

    /// The lookup did not complete in time.
    #[error("Worker directory timed out after {0:?}")]
    Timeout(Duration),
}

/// Receipt post-processing failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostProcessError {
    /// The endpoint answered with a non-success status.
    #[error("Receipt post-processing returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// The request could not be sent or its response read.
    #[error("Receipt post-processing request failed: {0}")]
    Transport(String),

    /// The call did not complete in time.
    #[error("Receipt post-processing timed out after {0:?}")]
    Timeout(Duration),
}

/// Any failure that turns a ride request into a `500`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No resolved identity on the request.
    #[error("Authorization not configured")]
    AuthorizationMissing,

    /// The body is not a ride request.
    #[error("{0}")]
    MalformedRequest(String),

    /// The worker directory could not supply a candidate.
    #[error(transparent)]
    DirectoryLookup(#[from] DirectoryError),

    /// A store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The dispatch event could not be published.
    #[error(transparent)]
    Publish(#[from] EventBusError),

    /// The dispatch event could not be encoded.
    #[error("{0}")]
    Encoding(String),
}

impl DispatchError {
    /// Short machine-readable kind, used as a log and metric label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AuthorizationMissing => "authorization_missing",
            Self::MalformedRequest(_) => "malformed_request",
            Self::DirectoryLookup(_) => "directory_lookup",
            Self::Store(_) | Self::Publish(_) | Self::Encoding(_) => "infrastructure",
        }
    }
}
