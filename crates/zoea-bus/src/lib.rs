// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Non-blocking publish/subscribe event bus.
//!
//! Each subscriber gets its own bounded FIFO queue. A slow subscriber never
//! blocks `Publish`: if its queue is full, the event is dropped for that
//! subscriber and its drop counter is incremented. `Close` is idempotent and
//! tears every subscriber channel down exactly once.

mod event;

pub use event::Event;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::trace;

/// Default per-subscriber queue capacity, per the core spec (~1000).
pub const DEFAULT_CAPACITY: usize = 1000;

struct Subscriber {
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

/// A bounded-queue receiver handle returned by [`EventBus::subscribe`].
pub struct Subscription {
    pub rx: mpsc::Receiver<Event>,
    dropped: Arc<AtomicU64>,
}

impl Subscription {
    /// Number of events dropped for this subscriber because its queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Typed pub/sub bus shared by the commander, mysis runtimes and any UI/telemetry consumer.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

struct Inner {
    subscribers: Mutex<Vec<Subscriber>>,
    closed: AtomicBool,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                capacity,
            }),
        }
    }

    /// Register a new subscriber. Subscribing after `close()` returns an
    /// already-closed (empty, immediately-`None`) receiver rather than erroring,
    /// since a subscriber racing shutdown should simply see no more events.
    pub async fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        if self.inner.closed.load(Ordering::SeqCst) {
            return Subscription { rx, dropped };
        }
        let mut subs = self.inner.subscribers.lock().await;
        subs.push(Subscriber {
            tx,
            dropped: dropped.clone(),
        });
        Subscription { rx, dropped }
    }

    /// Publish an event to every current subscriber. Never blocks: a
    /// subscriber whose queue is full is skipped and its drop counter bumped.
    /// Safe to call from any task; a no-op after `close()`.
    pub async fn publish(&self, event: Event) {
        if self.inner.closed.load(Ordering::SeqCst) {
            return;
        }
        let subs = self.inner.subscribers.lock().await;
        for sub in subs.iter() {
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    sub.dropped.fetch_add(1, Ordering::Relaxed);
                    trace!(event = ?event, "dropped for slow subscriber");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Subscriber dropped its receiver; will be pruned on next publish cycle.
                }
            }
        }
    }

    /// Close the bus: drop every subscriber sender, discard the subscriber
    /// set. Idempotent — calling this N times has the same effect as once.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut subs = self.inner.subscribers.lock().await;
        subs.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().await.len()
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_event() -> Event {
        Event {
            kind: event::EventKind::MysisMessage,
            mysis_id: Uuid::new_v4(),
            mysis_name: "alpha".to_string(),
            timestamp: Utc::now(),
            payload: serde_json::json!({"text": "hi"}),
        }
    }

    // ── Pub/sub basics ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn publish_is_delivered_to_subscriber() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe().await;
        bus.publish(sample_event()).await;
        let received = sub.rx.recv().await.unwrap();
        assert_eq!(received.mysis_name, "alpha");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(8);
        bus.publish(sample_event()).await;
    }

    #[tokio::test]
    async fn each_subscriber_gets_its_own_copy() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe().await;
        let mut b = bus.subscribe().await;
        bus.publish(sample_event()).await;
        assert!(a.rx.recv().await.is_some());
        assert!(b.rx.recv().await.is_some());
    }

    // ── Back-pressure ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn full_queue_drops_with_counter_increment_without_blocking_others() {
        let bus = EventBus::new(1);
        let mut slow = bus.subscribe().await;
        let mut fast = bus.subscribe().await;

        bus.publish(sample_event()).await; // fills slow's queue (capacity 1)
        bus.publish(sample_event()).await; // should drop for slow, not block

        assert_eq!(slow.dropped_count(), 1);
        assert!(fast.rx.recv().await.is_some());
        assert!(fast.rx.recv().await.is_some());

        // drain the one buffered event for `slow` so the receiver isn't unused
        assert!(slow.rx.recv().await.is_some());
    }

    // ── Close ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn close_is_idempotent() {
        let bus = EventBus::new(8);
        let _sub = bus.subscribe().await;
        bus.close().await;
        bus.close().await;
        bus.close().await;
        assert!(bus.is_closed());
        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn publish_after_close_is_a_silent_noop() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe().await;
        bus.close().await;
        bus.publish(sample_event()).await;
        assert!(sub.rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn subscribe_after_close_yields_immediately_closed_receiver() {
        let bus = EventBus::new(8);
        bus.close().await;
        let mut sub = bus.subscribe().await;
        assert!(sub.rx.recv().await.is_none());
    }
}
