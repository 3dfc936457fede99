//! Notification batching for the LotWire runtime
//!
//! Incoming events are queued per (recipient, category) key and coalesced
//! into one deliverable per key when the shared batch window expires.
//! High-priority events additionally dispatch immediately while staying in
//! their batch entry, so the eventual summary still counts them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use lotwire_core::{BatchConfig, Category, Deliverable, DispatchSender, Priority, RawEvent, UserId};

use super::lock;

type BatchKey = (UserId, Category);

// ----------------------------------------------------------------------------
// Queue Internals
// ----------------------------------------------------------------------------

struct QueueInner {
    batch_delay: std::time::Duration,
    /// Pending events per key; swapped wholesale on flush so concurrent
    /// enqueues land in a fresh map
    entries: Mutex<HashMap<BatchKey, Vec<RawEvent>>>,
    /// The shared window timer, armed by the first enqueue after a flush.
    /// Lock ordering: `timer` before `entries`, in both enqueue and flush.
    timer: Mutex<Option<JoinHandle<()>>>,
    dispatch_tx: DispatchSender,
    closed: AtomicBool,
}

impl QueueInner {
    /// Drain all pending entries and dispatch one deliverable per key
    async fn flush(self: Arc<Self>) {
        let drained = {
            let mut timer = lock(&self.timer);
            let mut entries = lock(&self.entries);
            *timer = None;
            std::mem::take(&mut *entries)
        };

        for ((recipient, category), events) in drained {
            let deliverable = match events.as_slice() {
                [] => continue,
                [only] => Deliverable::single(only, format!("{}:{}", category, recipient)),
                _ => Deliverable::batch(&recipient, &category, &events),
            };
            debug!(
                recipient = %recipient,
                category = %category,
                count = events.len(),
                "flushing batch entry"
            );
            if self.dispatch_tx.send((recipient, deliverable)).await.is_err() {
                warn!("dispatch channel closed, dropping flushed deliverable");
                return;
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Batch Queue
// ----------------------------------------------------------------------------

/// Coalesces bursts of events into per-key batch deliverables
pub struct BatchQueue {
    inner: Arc<QueueInner>,
}

impl BatchQueue {
    pub fn new(config: BatchConfig, dispatch_tx: DispatchSender) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                batch_delay: config.batch_delay,
                entries: Mutex::new(HashMap::new()),
                timer: Mutex::new(None),
                dispatch_tx,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Queue an event under its (recipient, category) key
    ///
    /// Arms the shared window timer if none is pending. High-priority
    /// events are also dispatched immediately as singles; they remain in
    /// the batch entry so the window summary counts them.
    ///
    /// Non-blocking, so it is safe to call from channel callbacks.
    pub fn enqueue(&self, event: RawEvent) {
        if self.inner.closed.load(Ordering::Acquire) {
            debug!("enqueue after close, dropping event");
            return;
        }

        if event.priority == Priority::High {
            let tag = format!("{}:{}:urgent", event.category, event.recipient);
            let deliverable = Deliverable::single(&event, tag);
            if self
                .inner
                .dispatch_tx
                .try_send((event.recipient.clone(), deliverable))
                .is_err()
            {
                warn!("dispatch channel full, high-priority fast path dropped");
            }
        }

        let key = (event.recipient.clone(), event.category.clone());
        let mut timer = lock(&self.inner.timer);
        lock(&self.inner.entries).entry(key).or_default().push(event);

        if timer.is_none() {
            let inner = Arc::clone(&self.inner);
            *timer = Some(tokio::spawn(async move {
                tokio::time::sleep(inner.batch_delay).await;
                inner.flush().await;
            }));
        }
    }

    /// Number of keys currently holding pending events
    pub fn pending_keys(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    /// Stop the queue: cancel the window timer and drop pending events
    ///
    /// Idempotent. Events enqueued after close are discarded.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = lock(&self.inner.timer).take() {
            handle.abort();
        }
        lock(&self.inner.entries).clear();
        debug!("batch queue closed");
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use lotwire_core::{ChannelConfig, DeliverableKind, Timestamp};

    fn queue() -> (BatchQueue, lotwire_core::DispatchReceiver) {
        let (tx, rx) = lotwire_core::create_dispatch_channel(&ChannelConfig::testing());
        (BatchQueue::new(BatchConfig::testing(), tx), rx)
    }

    fn event(user: &str, category: &str, title: &str) -> RawEvent {
        RawEvent::new(
            UserId::new(user),
            Category::new(category),
            title,
            "body",
            Timestamp::new(0),
        )
    }

    #[tokio::test]
    async fn test_burst_coalesces_into_one_batch() {
        let (queue, mut rx) = queue();
        for i in 0..5 {
            queue.enqueue(event("u1", "listing", &format!("t{}", i)));
        }

        let (recipient, deliverable) = rx.recv().await.unwrap();
        assert_eq!(recipient, UserId::new("u1"));
        assert_eq!(deliverable.kind, DeliverableKind::Batch);
        assert_eq!(deliverable.notification_count(), 5);
        assert_eq!(queue.pending_keys(), 0);
    }

    #[tokio::test]
    async fn test_lone_event_flushes_as_single() {
        let (queue, mut rx) = queue();
        queue.enqueue(event("u1", "listing", "only"));

        let (_, deliverable) = rx.recv().await.unwrap();
        assert_eq!(deliverable.kind, DeliverableKind::Single);
        assert_eq!(deliverable.title, "only");
    }

    #[tokio::test]
    async fn test_keys_flush_independently() {
        let (queue, mut rx) = queue();
        queue.enqueue(event("u1", "listing", "a"));
        queue.enqueue(event("u1", "message", "b"));
        queue.enqueue(event("u2", "listing", "c"));

        let mut received = Vec::new();
        for _ in 0..3 {
            let (recipient, deliverable) = rx.recv().await.unwrap();
            received.push((recipient, deliverable.kind));
        }
        assert!(received.iter().all(|(_, kind)| *kind == DeliverableKind::Single));
    }

    #[tokio::test]
    async fn test_high_priority_fast_path_and_batch_count() {
        let (queue, mut rx) = queue();
        queue.enqueue(event("u1", "offer", "normal 1"));
        queue.enqueue(event("u1", "offer", "urgent").with_priority(Priority::High));
        queue.enqueue(event("u1", "offer", "normal 2"));

        // Fast path arrives before the window expires
        let (_, first) = rx.recv().await.unwrap();
        assert_eq!(first.kind, DeliverableKind::Single);
        assert_eq!(first.title, "urgent");
        assert_eq!(first.priority, Priority::High);

        // Window flush still counts the fast-pathed event
        let (_, flushed) = rx.recv().await.unwrap();
        assert_eq!(flushed.kind, DeliverableKind::Batch);
        assert_eq!(flushed.notification_count(), 3);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_drops_pending() {
        let (queue, mut rx) = queue();
        queue.enqueue(event("u1", "listing", "pending"));
        queue.close();
        queue.close();
        queue.enqueue(event("u1", "listing", "after close"));

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(queue.pending_keys(), 0);
    }
}
