//! Outbound collaborators.
//!
//! Both are sources of external nondeterminism (which worker is chosen,
//! whether post-processing succeeds) and are injected so tests can supply
//! deterministic stand-ins.

use crate::error::{DirectoryError, PostProcessError};
use crate::types::{Location, ReceiptArtifact, Unicorn};
use std::future::Future;
use std::pin::Pin;

/// Finds a candidate worker near a pickup point.
pub trait WorkerDirectory: Send + Sync {
    /// Look up a candidate worker.
    fn find_unicorn(
        &self,
        pickup: Location,
    ) -> Pin<Box<dyn Future<Output = Result<Unicorn, DirectoryError>> + Send + '_>>;
}

/// The receipt post-processing endpoint.
///
/// The endpoint is unreliable and never retries by itself.
pub trait ReceiptPostProcessor: Send + Sync {
    /// Submit a stored receipt for post-processing.
    fn process<'a>(
        &'a self,
        artifact: &'a ReceiptArtifact,
    ) -> Pin<Box<dyn Future<Output = Result<(), PostProcessError>> + Send + 'a>>;
}
