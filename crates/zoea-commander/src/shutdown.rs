// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The ordered, idempotent shutdown sequence triggered by `SIGINT`,
//! `SIGTERM`, or the UI quitting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::fleet::Commander;

const STOP_ALL_DEADLINE: Duration = Duration::from_secs(5);

/// Runs the six-step shutdown sequence exactly once. Safe to call from
/// multiple signal handlers; only the first call does any work.
pub struct ShutdownSequencer {
    commander: Arc<Commander>,
    done: AtomicBool,
}

impl ShutdownSequencer {
    pub fn new(commander: Arc<Commander>) -> Self {
        Self { commander, done: AtomicBool::new(false) }
    }

    /// Ordered, idempotent teardown:
    /// 1. close the event bus, unblocking any consumer parked on a read
    /// 2. `Commander.StopAll()` bounded by a 5s deadline
    /// 3. close the upstream tool client
    /// 4. close every provider attached to a mysis (a no-op in this build:
    ///    providers are constructed fresh per turn and dropped at the end
    ///    of it, so none outlive a turn to hold open)
    /// 5. release every claimed account, then close the store
    /// 6. nothing left to close after this; the log sink outlives the call
    pub async fn run(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("shutdown: closing event bus");
        self.commander.event_bus().close().await;

        info!("shutdown: stopping all myses");
        self.commander.stop_all(STOP_ALL_DEADLINE).await;

        info!("shutdown: closing upstream tool client");
        self.commander.tool_registry().close().await;

        info!("shutdown: releasing accounts and closing store");
        let store = self.commander.store();
        if let Err(e) = store.release_all_accounts().await {
            tracing::warn!(error = %e, "failed to release accounts during shutdown");
        }
        if let Err(e) = store.close().await {
            tracing::warn!(error = %e, "failed to close store during shutdown");
        }

        info!("shutdown sequence complete");
    }
}
