//! Dead letter queue for work that exhausted its redelivery policy.
//!
//! Entries are kept in memory, bounded, oldest dropped first. They exist
//! for inspection and manual replay; nothing consumes them automatically.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Dead letter queue entry
#[derive(Debug, Clone)]
pub struct DeadLetter<T> {
    /// The undelivered payload
    pub payload: T,

    /// Consumer that gave up on it
    pub consumer: String,

    /// Attempts made, including the first
    pub attempts: usize,

    /// The error message from the last failure
    pub error_message: String,

    /// When the entry was dead-lettered
    pub failed_at: DateTime<Utc>,
}

/// Bounded, shareable dead letter queue.
///
/// Clones share the same storage.
///
/// # Example
///
/// ```
/// use wild_rydes_runtime::dlq::DeadLetterQueue;
///
/// let dlq = DeadLetterQueue::new(1000);
/// dlq.push("payload".to_string(), "receipt-pipeline", "BORKED".to_string(), 4);
/// assert_eq!(dlq.len(), 1);
///
/// for entry in dlq.drain() {
///     assert_eq!(entry.consumer, "receipt-pipeline");
/// }
/// ```
#[derive(Debug)]
pub struct DeadLetterQueue<T> {
    queue: Arc<Mutex<VecDeque<DeadLetter<T>>>>,
    max_size: usize,
}

impl<T> DeadLetterQueue<T> {
    /// Create a new dead letter queue with the given max size
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            max_size,
        }
    }

    /// Push an undelivered payload.
    ///
    /// If the queue is full, the oldest entry is dropped.
    pub fn push(&self, payload: T, consumer: &str, error_message: String, attempts: usize) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);

        if queue.len() >= self.max_size {
            queue.pop_front();
            metrics::counter!("dlq_dropped_total").increment(1);
            tracing::warn!(max_size = self.max_size, "DLQ at capacity, dropping oldest entry");
        }

        queue.push_back(DeadLetter {
            payload,
            consumer: consumer.to_string(),
            attempts,
            error_message,
            failed_at: Utc::now(),
        });

        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("dlq_size").set(queue.len() as f64);
        metrics::counter!("dlq_pushed_total", "consumer" => consumer.to_string()).increment(1);

        tracing::warn!(
            consumer,
            attempts,
            queue_size = queue.len(),
            "Delivery moved to dead letter queue"
        );
    }

    /// Get the current queue size
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every entry.
    pub fn drain(&self) -> Vec<DeadLetter<T>> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let entries: Vec<_> = queue.drain(..).collect();
        metrics::gauge!("dlq_size").set(0.0);
        entries
    }

    /// Snapshot every entry without removing them.
    #[must_use]
    pub fn entries(&self) -> Vec<DeadLetter<T>>
    where
        T: Clone,
    {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl<T> Clone for DeadLetterQueue<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            max_size: self.max_size,
        }
    }
}

impl<T> Default for DeadLetterQueue<T> {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_oldest_when_full() {
        let dlq = DeadLetterQueue::new(2);
        dlq.push(1, "rides", "a".to_string(), 1);
        dlq.push(2, "rides", "b".to_string(), 1);
        dlq.push(3, "rides", "c".to_string(), 1);

        let payloads: Vec<i32> = dlq.entries().into_iter().map(|e| e.payload).collect();
        assert_eq!(payloads, vec![2, 3]);
    }

    #[test]
    fn clones_share_storage() {
        let dlq: DeadLetterQueue<&str> = DeadLetterQueue::default();
        let handle = dlq.clone();
        handle.push("event", "receipts", "BORKED".to_string(), 4);

        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq.drain().len(), 1);
        assert!(handle.is_empty());
    }
}
