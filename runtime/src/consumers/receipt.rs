use super::decode_dispatch;
use crate::metrics::ConsumerMetrics;
use std::sync::Arc;
use tokio::time::timeout;
use wild_rydes_core::config::ReceiptConfig;
use wild_rydes_core::error::PostProcessError;
use wild_rydes_core::event::SerializedEvent;
use wild_rydes_core::event_bus::{EventHandler, HandlerError, HandlerFuture};
use wild_rydes_core::services::ReceiptPostProcessor;
use wild_rydes_core::stores::ArtifactStore;
use wild_rydes_core::types::ReceiptArtifact;

/// Stores each dispatch event as a receipt, then submits it for
/// post-processing.
///
/// The payload is the event exactly as delivered. A failed or timed-out
/// post-processing call leaves the delivery unacknowledged; the bus
/// redelivers and the artifact is overwritten with identical bytes.
pub struct ReceiptPipeline {
    artifacts: Arc<dyn ArtifactStore>,
    processor: Arc<dyn ReceiptPostProcessor>,
    config: ReceiptConfig,
}

impl ReceiptPipeline {
    /// Subscriber name.
    pub const NAME: &'static str = "receipt-pipeline";

    /// Pipeline writing to `artifacts` and submitting to `processor`.
    #[must_use]
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        processor: Arc<dyn ReceiptPostProcessor>,
        config: ReceiptConfig,
    ) -> Self {
        Self {
            artifacts,
            processor,
            config,
        }
    }

    /// Process one delivery.
    ///
    /// # Errors
    ///
    /// [`HandlerError::Rejected`] when the event does not decode,
    /// [`HandlerError::Retryable`] when the artifact write or the
    /// post-processing call fails.
    pub async fn process(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
        let dispatch = decode_dispatch(event)?;
        let artifact = ReceiptArtifact {
            ride_id: dispatch.ride_id,
            payload: event.data.clone(),
        };
        let key = artifact.key();
        let limit = self.config.call_timeout;

        timeout(limit, self.artifacts.put(key.clone(), artifact.payload.clone()))
            .await
            .map_err(|_| HandlerError::Retryable(format!("receipt write timed out after {limit:?}")))?
            .map_err(|e| HandlerError::Retryable(e.to_string()))?;
        tracing::debug!(ride_id = %artifact.ride_id, key = %key, "Receipt stored");

        let processed = timeout(limit, self.processor.process(&artifact))
            .await
            .unwrap_or(Err(PostProcessError::Timeout(limit)));
        ConsumerMetrics::record_post_processing(processed.is_ok());

        match processed {
            Ok(()) => {
                tracing::info!(ride_id = %artifact.ride_id, "Receipt post-processed");
                Ok(())
            },
            Err(error) => {
                tracing::warn!(ride_id = %artifact.ride_id, error = %error, "Receipt post-processing failed");
                Err(HandlerError::Retryable(error.to_string()))
            },
        }
    }
}

impl EventHandler for ReceiptPipeline {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle<'a>(&'a self, event: &'a SerializedEvent) -> HandlerFuture<'a> {
        Box::pin(self.process(event))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::InMemoryArtifactStore;
    use std::time::Duration;
    use wild_rydes_core::environment::Clock;
    use wild_rydes_core::types::{RideDetail, RideDispatchEvent, RideId, Unicorn};
    use wild_rydes_testing::{ScriptedPostProcessor, test_clock};

    fn dispatched(ride_id: &str) -> SerializedEvent {
        let event = RideDispatchEvent {
            ride_id: RideId::new(ride_id),
            email: Some("rider@example.com".to_string()),
            user: "rider".to_string(),
            request_time: test_clock().now(),
            ride_detail: RideDetail::reserved(Unicorn::named("Sparkle")),
        };
        SerializedEvent::from_event(&event, None).unwrap()
    }

    fn pipeline(
        processor: ScriptedPostProcessor,
    ) -> (ReceiptPipeline, Arc<InMemoryArtifactStore>) {
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let pipeline = ReceiptPipeline::new(
            artifacts.clone(),
            Arc::new(processor),
            ReceiptConfig::default(),
        );
        (pipeline, artifacts)
    }

    #[tokio::test]
    async fn stores_event_verbatim_and_submits_it() {
        let processor = ScriptedPostProcessor::new([true]);
        let (pipeline, artifacts) = pipeline(processor.clone());
        let event = dispatched("ride-1");

        pipeline.process(&event).await.unwrap();

        let stored = artifacts.get("receipts/ride-1.json").await.unwrap().unwrap();
        assert_eq!(stored, event.data);
        assert_eq!(processor.received()[0].payload, event.data);
    }

    #[tokio::test]
    async fn failed_post_processing_is_retryable_and_redelivery_succeeds() {
        let processor = ScriptedPostProcessor::new([false, true]);
        let (pipeline, artifacts) = pipeline(processor.clone());
        let event = dispatched("ride-1");

        let first = pipeline.process(&event).await;
        assert!(matches!(first, Err(HandlerError::Retryable(ref msg)) if msg.contains("BORKED")));

        pipeline.process(&event).await.unwrap();
        assert_eq!(artifacts.keys(), vec!["receipts/ride-1.json".to_string()]);
        assert_eq!(processor.received().len(), 2);
    }

    #[tokio::test]
    async fn undecodable_event_is_rejected() {
        let processor = ScriptedPostProcessor::default();
        let (pipeline, artifacts) = pipeline(processor.clone());
        let garbage = SerializedEvent::new("UnicornDispatched.v1".to_string(), b"nope".to_vec(), None);

        let result = pipeline.process(&garbage).await;

        assert!(matches!(result, Err(HandlerError::Rejected(_))));
        assert!(artifacts.keys().is_empty());
        assert!(processor.received().is_empty());
    }

    struct HangingPostProcessor;

    impl ReceiptPostProcessor for HangingPostProcessor {
        fn process<'a>(
            &'a self,
            _artifact: &'a ReceiptArtifact,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<(), PostProcessError>> + Send + 'a>,
        > {
            Box::pin(futures::future::pending())
        }
    }

    #[tokio::test]
    async fn slow_post_processing_times_out_as_retryable() {
        let config = ReceiptConfig {
            call_timeout: Duration::from_millis(10),
            ..ReceiptConfig::default()
        };
        let pipeline = ReceiptPipeline::new(
            Arc::new(InMemoryArtifactStore::new()),
            Arc::new(HangingPostProcessor),
            config,
        );

        let result = pipeline.process(&dispatched("ride-1")).await;

        assert!(matches!(result, Err(HandlerError::Retryable(ref msg)) if msg.contains("timed out")));
    }
}
