// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Shutdown completion counter: one increment per `Start`, one decrement
//! when a run loop exits. `StopAll` waits on this with a bounded deadline.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Default)]
pub struct RunBarrier {
    count: AtomicI64,
    notify: Notify,
}

impl RunBarrier {
    pub fn new() -> Self {
        Self { count: AtomicI64::new(0), notify: Notify::new() }
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrements and wakes any waiter once the count reaches zero.
    pub fn decrement(&self) {
        let prev = self.count.fetch_sub(1, Ordering::SeqCst);
        if prev <= 1 {
            self.notify.notify_waiters();
        }
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Waits for the count to reach zero, bounded by `deadline`. Returns
    /// `true` if it reached zero in time, `false` on timeout.
    pub async fn wait_zero(&self, deadline: Duration) -> bool {
        if self.count() <= 0 {
            return true;
        }
        tokio::time::timeout(deadline, async {
            loop {
                let notified = self.notify.notified();
                if self.count() <= 0 {
                    return;
                }
                notified.await;
                if self.count() <= 0 {
                    return;
                }
            }
        })
        .await
        .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn wait_zero_returns_immediately_when_already_zero() {
        let barrier = RunBarrier::new();
        assert!(barrier.wait_zero(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn wait_zero_unblocks_on_decrement() {
        let barrier = Arc::new(RunBarrier::new());
        barrier.increment();
        let waiter = barrier.clone();
        let handle = tokio::spawn(async move { waiter.wait_zero(Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        barrier.decrement();
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn wait_zero_times_out_if_never_decremented() {
        let barrier = RunBarrier::new();
        barrier.increment();
        assert!(!barrier.wait_zero(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn multiple_increments_require_matching_decrements() {
        let barrier = RunBarrier::new();
        barrier.increment();
        barrier.increment();
        barrier.decrement();
        assert!(!barrier.wait_zero(Duration::from_millis(20)).await);
        barrier.decrement();
        assert!(barrier.wait_zero(Duration::from_millis(20)).await);
    }
}
