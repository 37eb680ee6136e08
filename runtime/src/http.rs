//! HTTP clients for the worker directory and the receipt post-processor.

use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use wild_rydes_core::error::{DirectoryError, PostProcessError};
use wild_rydes_core::services::{ReceiptPostProcessor, WorkerDirectory};
use wild_rydes_core::types::{Location, ReceiptArtifact, Unicorn};

/// Worker directory reached at `GET https://{endpoint}/unicorn`.
///
/// The pickup point travels as `latitude` and `longitude` query
/// parameters. An endpoint given with an explicit `http://` or `https://`
/// scheme is used as is.
#[derive(Clone)]
pub struct HttpWorkerDirectory {
    client: Client,
    endpoint: Option<String>,
    timeout: Duration,
}

impl HttpWorkerDirectory {
    /// Directory at `endpoint`. `None` makes every lookup fail with
    /// [`DirectoryError::NotConfigured`].
    #[must_use]
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            timeout,
        }
    }

    fn url(endpoint: &str) -> String {
        let base = endpoint.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{base}/unicorn")
        } else {
            format!("https://{base}/unicorn")
        }
    }

    async fn lookup(&self, pickup: Location) -> Result<Unicorn, DirectoryError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or(DirectoryError::NotConfigured)?;

        let response = self
            .client
            .get(Self::url(endpoint))
            .query(&[
                ("latitude", pickup.latitude.to_string()),
                ("longitude", pickup.longitude.to_string()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Request(format!("{status}: {body}")));
        }

        response
            .json::<Unicorn>()
            .await
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))
    }

    fn request_error(&self, error: &reqwest::Error) -> DirectoryError {
        if error.is_timeout() {
            DirectoryError::Timeout(self.timeout)
        } else {
            DirectoryError::Request(error.to_string())
        }
    }
}

impl WorkerDirectory for HttpWorkerDirectory {
    fn find_unicorn(
        &self,
        pickup: Location,
    ) -> Pin<Box<dyn Future<Output = Result<Unicorn, DirectoryError>> + Send + '_>> {
        Box::pin(self.lookup(pickup))
    }
}

/// Receipt post-processor reached with `PUT {url}`, body forwarded as is.
#[derive(Clone)]
pub struct HttpPostProcessor {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpPostProcessor {
    /// Post-processor at `url`.
    #[must_use]
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout,
        }
    }

    async fn submit(&self, artifact: &ReceiptArtifact) -> Result<(), PostProcessError> {
        let response = self
            .client
            .put(&self.url)
            .header("content-type", "application/json")
            .body(artifact.payload.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PostProcessError::Timeout(self.timeout)
                } else {
                    PostProcessError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(PostProcessError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl ReceiptPostProcessor for HttpPostProcessor {
    fn process<'a>(
        &'a self,
        artifact: &'a ReceiptArtifact,
    ) -> Pin<Box<dyn Future<Output = Result<(), PostProcessError>> + Send + 'a>> {
        Box::pin(self.submit(artifact))
    }
}
