// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed event type enumeration observable by the UI and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MysisCreated,
    MysisStateChanged,
    MysisMessage,
    MysisResponse,
    MysisError,
    NetworkBusy,
    NetworkIdle,
    RateLimitHit,
    BroadcastDelivered,
}

/// A single bus event: `{type, mysis_id, mysis_name, timestamp, payload}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub mysis_id: Uuid,
    pub mysis_name: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(kind: EventKind, mysis_id: Uuid, mysis_name: impl Into<String>) -> Self {
        Self {
            kind,
            mysis_id,
            mysis_name: mysis_name.into(),
            timestamp: Utc::now(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
