//! Bounded message pipeline
//!
//! Connects one ingress to the dispatcher task that fans its messages out.
//! Each pipeline has exactly one producer (the ingress reader) and exactly
//! one reader (the dispatcher); fan-out to consumers happens on the reader
//! side.
//!
//! The producer side never blocks: `offer` drops the message when the buffer
//! is full. Dropping preserves daemon liveness under bursty producers and
//! jammed consumers, which is the right trade for log-stream routing. A
//! producer that sees a drop should back off for [`OFFER_BACKOFF`] before
//! reading its next message to avoid busy-looping against a full buffer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::config::DEFAULT_BUFFER;

/// How long a producer sleeps after a dropped offer.
pub const OFFER_BACKOFF: Duration = Duration::from_millis(100);

/// Reader half of a pipeline. Handed to the dispatcher exactly once.
pub type MessageReceiver = mpsc::Receiver<String>;

/// Producer half of a pipeline, held by the ingress reader task.
#[derive(Clone)]
pub struct MessageSender {
    tx: mpsc::Sender<String>,
}

impl MessageSender {
    /// Non-blocking send. Returns `false` when the message was dropped
    /// because the buffer is full (or the reader is gone).
    pub fn offer(&self, msg: String) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Create a pipeline with the given capacity. A capacity of 0 means the
/// default (50).
pub fn bounded(capacity: usize) -> (MessageSender, MessageReceiver) {
    let capacity = if capacity == 0 { DEFAULT_BUFFER } else { capacity };
    let (tx, rx) = mpsc::channel(capacity);
    (MessageSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offer_preserves_order() {
        let (tx, mut rx) = bounded(10);

        assert!(tx.offer("one".to_string()));
        assert!(tx.offer("two".to_string()));
        assert!(tx.offer("three".to_string()));

        assert_eq!(rx.recv().await.unwrap(), "one");
        assert_eq!(rx.recv().await.unwrap(), "two");
        assert_eq!(rx.recv().await.unwrap(), "three");
    }

    #[tokio::test]
    async fn test_full_buffer_drops_instead_of_blocking() {
        let (tx, mut rx) = bounded(2);

        for i in 0..10 {
            tx.offer(format!("msg-{i}"));
        }

        // Only the first two fit; the rest were dropped, never queued.
        assert_eq!(rx.recv().await.unwrap(), "msg-0");
        assert_eq!(rx.recv().await.unwrap(), "msg-1");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_zero_capacity_means_default() {
        let (tx, mut rx) = bounded(0);

        for i in 0..DEFAULT_BUFFER + 5 {
            tx.offer(format!("msg-{i}"));
        }

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, DEFAULT_BUFFER);
    }

    #[tokio::test]
    async fn test_offer_after_reader_dropped_reports_drop() {
        let (tx, rx) = bounded(2);
        drop(rx);
        assert!(!tx.offer("orphan".to_string()));
    }
}
